//! Pluggable JSON serialization.

use serde_json::Value;

/// Converts between JSON values and their text form.
///
/// Used for request bodies, GET query parameters and response bodies.
pub trait JsonSerializer: Send + Sync {
    /// Serialize a value to text.
    fn stringify(&self, value: &Value) -> serde_json::Result<String>;

    /// Parse text into a value.
    fn parse(&self, text: &str) -> serde_json::Result<Value>;
}

/// Standard JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultJsonSerializer;

impl JsonSerializer for DefaultJsonSerializer {
    fn stringify(&self, value: &Value) -> serde_json::Result<String> {
        serde_json::to_string(value)
    }

    fn parse(&self, text: &str) -> serde_json::Result<Value> {
        serde_json::from_str(text)
    }
}
