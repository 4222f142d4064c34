//! Property-map JSON rendering.
//!
//! Serializes an event's property map to the compact JSON blob stored in
//! the `properties` column. The `SourceContext` and `ThreadId` properties
//! have dedicated columns and are excluded here.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::event::PropertyValue;

use super::values::truncate_chars;

/// Property names with dedicated columns, excluded from the JSON blob.
pub const RESERVED_PROPERTIES: [&str; 2] = ["SourceContext", "ThreadId"];

struct FilteredProperties<'a>(&'a BTreeMap<String, PropertyValue>);

impl Serialize for FilteredProperties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self
            .0
            .iter()
            .filter(|(name, _)| !RESERVED_PROPERTIES.contains(&name.as_str()));
        let mut map = serializer.serialize_map(None)?;
        for (name, value) in entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Renders the property map as a compact JSON object string, or `None`
/// when the event carries no properties at all.
///
/// Truncation applies after serialization and may cut the string inside
/// the JSON structure; a too-small limit therefore stores an invalid
/// fragment rather than dropping data silently.
pub fn render_properties(
    properties: &BTreeMap<String, PropertyValue>,
    limit: Option<usize>,
) -> Option<String> {
    if properties.is_empty() {
        return None;
    }
    let json = serde_json::to_string(&FilteredProperties(properties))
        .unwrap_or_else(|_| "{}".to_string());
    Some(truncate_chars(json, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn props(entries: Vec<(&str, PropertyValue)>) -> BTreeMap<String, PropertyValue> {
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn test_empty_map_renders_nothing() {
        assert_eq!(render_properties(&BTreeMap::new(), None), None);
    }

    #[test]
    fn test_reserved_properties_are_excluded() {
        let properties = props(vec![
            ("SourceContext", PropertyValue::String("auth".to_string())),
            ("ThreadId", PropertyValue::Int(4)),
            ("UserId", PropertyValue::Int(42)),
        ]);
        let json = render_properties(&properties, None).expect("json");
        assert_eq!(json, r#"{"UserId":42}"#);
    }

    #[test]
    fn test_only_reserved_properties_yields_empty_object() {
        let properties = props(vec![(
            "SourceContext",
            PropertyValue::String("auth".to_string()),
        )]);
        assert_eq!(render_properties(&properties, None), Some("{}".to_string()));
    }

    #[test]
    fn test_round_trip_of_every_shape() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        let id = Uuid::new_v4();
        let properties = props(vec![
            ("null", PropertyValue::Null),
            ("flag", PropertyValue::Bool(true)),
            ("count", PropertyValue::Int(-12)),
            ("ratio", PropertyValue::Float(0.25)),
            ("when", PropertyValue::from(ts)),
            ("id", PropertyValue::Uuid(id)),
            (
                "seq",
                PropertyValue::Sequence(vec![PropertyValue::Int(1), PropertyValue::String("two".to_string())]),
            ),
            (
                "shape",
                PropertyValue::Structure(vec![(
                    "inner".to_string(),
                    PropertyValue::Bool(false),
                )]),
            ),
        ]);

        let json = render_properties(&properties, None).expect("json");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid JSON");

        assert_eq!(parsed["null"], serde_json::Value::Null);
        assert_eq!(parsed["flag"], serde_json::json!(true));
        assert_eq!(parsed["count"], serde_json::json!(-12));
        assert_eq!(parsed["ratio"], serde_json::json!(0.25));
        assert_eq!(parsed["when"], serde_json::json!(ts.to_rfc3339()));
        assert_eq!(parsed["id"], serde_json::json!(id.to_string()));
        assert_eq!(parsed["seq"], serde_json::json!([1, "two"]));
        assert_eq!(parsed["shape"], serde_json::json!({"inner": false}));
    }

    #[test]
    fn test_truncation_may_break_json() {
        let properties = props(vec![(
            "text",
            PropertyValue::String("a".repeat(100)),
        )]);
        let json = render_properties(&properties, Some(10)).expect("json");
        assert_eq!(json.chars().count(), 10);
        assert!(serde_json::from_str::<serde_json::Value>(&json).is_err());
    }

    #[test]
    fn test_string_escaping() {
        let properties = props(vec![(
            "text",
            PropertyValue::String("line1\nline2 \"quoted\" \\ end".to_string()),
        )]);
        let json = render_properties(&properties, None).expect("json");
        assert!(json.contains(r#"\n"#));
        assert!(json.contains(r#"\""#));
        assert!(json.contains(r#"\\"#));
    }
}
