//! Structured property values.
//!
//! A closed union of every value shape an event property can take. The JSON
//! formatter and the scalar extractor in the write path are exhaustive
//! matches over this union, so adding a variant is a compile-checked change.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use uuid::Uuid;

/// A structured property value attached to a log event.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Absent value, serialized as JSON `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point number.
    Float(f64),
    /// Text.
    String(String),
    /// Point in time with an explicit offset, serialized as ISO-8601.
    Timestamp(DateTime<FixedOffset>),
    /// UUID, serialized in its hyphenated string form.
    Uuid(Uuid),
    /// Ordered sequence of nested values.
    Sequence(Vec<PropertyValue>),
    /// Named-field structure; field order is preserved.
    Structure(Vec<(String, PropertyValue)>),
    /// Key-value map, ordered by key.
    Map(BTreeMap<String, PropertyValue>),
}

impl PropertyValue {
    /// Whether this value is a scalar (not a sequence, structure, or map).
    pub fn is_scalar(&self) -> bool {
        !matches!(
            self,
            PropertyValue::Sequence(_) | PropertyValue::Structure(_) | PropertyValue::Map(_)
        )
    }
}

impl Serialize for PropertyValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PropertyValue::Null => serializer.serialize_unit(),
            PropertyValue::Bool(b) => serializer.serialize_bool(*b),
            PropertyValue::Int(i) => serializer.serialize_i64(*i),
            PropertyValue::UInt(u) => serializer.serialize_u64(*u),
            PropertyValue::Float(f) => serializer.serialize_f64(*f),
            PropertyValue::String(s) => serializer.serialize_str(s),
            PropertyValue::Timestamp(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            PropertyValue::Uuid(id) => serializer.serialize_str(&id.to_string()),
            PropertyValue::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            PropertyValue::Structure(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (name, value) in fields {
                    map.serialize_entry(name, value)?;
                }
                map.end()
            }
            PropertyValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

// The default string form is the JSON rendering; scalar extraction trims
// the surrounding quotes this produces for quoted shapes.
impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str("null"),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<i32> for PropertyValue {
    fn from(i: i32) -> Self {
        PropertyValue::Int(i64::from(i))
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<u64> for PropertyValue {
    fn from(u: u64) -> Self {
        PropertyValue::UInt(u)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<Uuid> for PropertyValue {
    fn from(id: Uuid) -> Self {
        PropertyValue::Uuid(id)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(ts: DateTime<Utc>) -> Self {
        PropertyValue::Timestamp(ts.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for PropertyValue {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        PropertyValue::Timestamp(ts)
    }
}
