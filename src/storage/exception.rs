//! Error-chain text rendering.
//!
//! Formats an event's attached error recursively: type name, message, and
//! stack, then every nested cause behind a marker line. Aggregate errors
//! contribute one marked section per cause.

use crate::event::ErrorInfo;

use super::values::truncate_chars;

/// Marker line written before each nested cause.
pub const CAUSE_MARKER: &str = "--- caused by ---";

/// Written in place of a cause once the chain exceeds [`MAX_CAUSE_DEPTH`].
pub const DEPTH_LIMIT_MARKER: &str = "--- cause depth limit reached ---";

/// Maximum cause nesting rendered before the chain is cut off.
pub const MAX_CAUSE_DEPTH: usize = 10;

/// Renders the full error chain, applying the character limit afterwards.
pub fn render_error(error: &ErrorInfo, limit: Option<usize>) -> String {
    let mut out = String::new();
    write_error(&mut out, error, 0);
    truncate_chars(out, limit)
}

fn write_error(out: &mut String, error: &ErrorInfo, depth: usize) {
    out.push_str(&error.type_name);
    out.push_str(": ");
    out.push_str(&error.message);
    if let Some(stack) = &error.stack {
        out.push('\n');
        out.push_str(stack);
    }
    for cause in &error.causes {
        out.push('\n');
        out.push_str(CAUSE_MARKER);
        out.push('\n');
        if depth + 1 >= MAX_CAUSE_DEPTH {
            out.push_str(DEPTH_LIMIT_MARKER);
        } else {
            write_error(out, cause, depth + 1);
        }
    }
}
