//! Per-row column value derivation.
//!
//! Converts one in-memory event into the concrete values bound into the
//! insert statement: rendered timestamp, level ordinal and name, truncated
//! text fields, and scalar values extracted for the extension columns.

use chrono::{DateTime, Local, Utc};

use crate::event::PropertyValue;

/// Timestamp rendering used for stored rows and retention cutoffs. A fixed
/// layout with no offset suffix keeps lexicographic and chronological
/// ordering aligned within one configured mode.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// A derived value ready to bind into a SQLite parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL bind.
    Null,
    /// Integer bind.
    Int(i64),
    /// Float bind.
    Float(f64),
    /// Text bind.
    Text(String),
}

/// Renders an event timestamp as ISO-8601 text in UTC or local time.
pub fn render_timestamp(timestamp: DateTime<Utc>, use_utc: bool) -> String {
    if use_utc {
        timestamp.format(TIMESTAMP_FORMAT).to_string()
    } else {
        timestamp
            .with_timezone(&Local)
            .format(TIMESTAMP_FORMAT)
            .to_string()
    }
}

/// Truncates `text` to at most `limit` characters. The boundary is
/// inclusive: a string exactly at the limit is returned untouched, and
/// `None` means unlimited.
pub fn truncate_chars(text: String, limit: Option<usize>) -> String {
    match limit {
        Some(max) if text.chars().count() > max => text.chars().take(max).collect(),
        _ => text,
    }
}

/// Extracts a bindable value from a property for an extension column.
///
/// Scalars bind their raw value; any nested shape binds its string form
/// with surrounding quote characters trimmed.
pub fn extract_scalar(value: &PropertyValue) -> SqlValue {
    match value {
        PropertyValue::Null => SqlValue::Null,
        PropertyValue::Bool(b) => SqlValue::Int(i64::from(*b)),
        PropertyValue::Int(i) => SqlValue::Int(*i),
        PropertyValue::UInt(u) => match i64::try_from(*u) {
            Ok(i) => SqlValue::Int(i),
            Err(_) => SqlValue::Text(u.to_string()),
        },
        PropertyValue::Float(f) => SqlValue::Float(*f),
        PropertyValue::String(s) => SqlValue::Text(s.clone()),
        PropertyValue::Timestamp(ts) => SqlValue::Text(ts.to_rfc3339()),
        PropertyValue::Uuid(id) => SqlValue::Text(id.to_string()),
        PropertyValue::Sequence(_) | PropertyValue::Structure(_) | PropertyValue::Map(_) => {
            SqlValue::Text(value.to_string().trim_matches('"').to_string())
        }
    }
}

/// Extracts a property as plain text, for the source-context and thread-id
/// columns. Follows the same scalar rule as [`extract_scalar`].
pub fn scalar_text(value: &PropertyValue) -> String {
    match value {
        PropertyValue::String(s) => s.clone(),
        other => other.to_string().trim_matches('"').to_string(),
    }
}

/// Identifier of the calling thread, used when an event carries no
/// `ThreadId` property.
pub fn current_thread_label() -> String {
    let thread = std::thread::current();
    match thread.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", thread.id()),
    }
}

/// Machine name captured once per writer: hostname environment probe with
/// a fixed fallback.
pub fn machine_name() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}
