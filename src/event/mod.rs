//! Log event model.
//!
//! Defines the immutable event record handed to the sink: severity level,
//! timestamps, rendered message and template, structured properties, and an
//! optional chained error description.

mod value;

pub use value::PropertyValue;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

/// Severity level of a log event, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    /// Fine-grained tracing output.
    Verbose,
    /// Developer-facing diagnostics.
    Debug,
    /// Routine informational events.
    Information,
    /// Unexpected but recoverable conditions.
    Warning,
    /// Failures of an operation.
    Error,
    /// Failures that take down the application.
    Fatal,
}

impl Level {
    /// Returns the canonical name of this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Verbose => "Verbose",
            Level::Debug => "Debug",
            Level::Information => "Information",
            Level::Warning => "Warning",
            Level::Error => "Error",
            Level::Fatal => "Fatal",
        }
    }

    /// Returns the integer ordinal stored alongside the name.
    pub fn ordinal(&self) -> i64 {
        *self as i64
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "verbose" => Ok(Level::Verbose),
            "debug" => Ok(Level::Debug),
            "information" => Ok(Level::Information),
            "warning" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            other => Err(format!("Unknown level name: {other}")),
        }
    }
}

/// A structured description of an error attached to an event.
///
/// Mirrors a chained error: a leaf has no causes, a wrapped error has one,
/// and an aggregate error carries several. Causes nest recursively.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorInfo {
    /// Name of the error type.
    pub type_name: String,
    /// Error message.
    pub message: String,
    /// Optional stack or backtrace description.
    pub stack: Option<String>,
    /// Nested causes, outermost first.
    pub causes: Vec<ErrorInfo>,
}

impl ErrorInfo {
    /// Creates a leaf error description.
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorInfo {
            type_name: type_name.into(),
            message: message.into(),
            stack: None,
            causes: Vec::new(),
        }
    }

    /// Attaches a stack description.
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Appends a nested cause.
    pub fn with_cause(mut self, cause: ErrorInfo) -> Self {
        self.causes.push(cause);
        self
    }
}

/// An immutable structured log event.
///
/// Produced once per log call by the logging front-end and consumed exactly
/// once by the sink's write path.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// When the event occurred, in UTC.
    pub timestamp: DateTime<Utc>,
    /// Severity level.
    pub level: Level,
    /// The rendered message text.
    pub message: String,
    /// The unrendered message template, stored verbatim.
    pub template: String,
    /// Optional chained error description.
    pub error: Option<ErrorInfo>,
    /// Structured properties attached to the event.
    pub properties: BTreeMap<String, PropertyValue>,
}

impl LogEvent {
    /// Creates an event stamped with the current time.
    ///
    /// The message doubles as the template until
    /// [`with_template`](Self::with_template) supplies the unrendered form.
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        let message = message.into();
        LogEvent {
            timestamp: Utc::now(),
            level,
            template: message.clone(),
            message,
            error: None,
            properties: BTreeMap::new(),
        }
    }

    /// Overrides the event timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the unrendered message template.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Attaches a structured property.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Attaches an error description.
    pub fn with_error(mut self, error: ErrorInfo) -> Self {
        self.error = Some(error);
        self
    }

    /// Sets the `SourceContext` property, stored in its dedicated column.
    pub fn with_source_context(self, context: impl Into<String>) -> Self {
        self.with_property("SourceContext", context.into())
    }
}
