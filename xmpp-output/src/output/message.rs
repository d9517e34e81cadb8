use serde_json::Value;
use std::collections::BTreeMap;

/// A parsed log message handed over by the host application.
///
/// The relay treats messages as opaque mappings from field name to text
/// value; it never interprets fields beyond looking them up by name during
/// formatting. Messages are supplied per call and never stored.
///
/// # Example
///
/// ```
/// use xmpp_output::output::LogMessage;
///
/// let message = LogMessage::new()
///     .with_field("source", "web1")
///     .with_field("message", "disk full");
/// assert_eq!(message.field("source"), Some("web1"));
/// assert_eq!(message.field("level"), None);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogMessage {
    fields: BTreeMap<String, String>,
}

impl LogMessage {
    /// Create an empty message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Insert or replace a field.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Iterate over all fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True when the message carries no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a message from a decoded JSON object.
    ///
    /// Hosts commonly hand outputs messages that started life as JSON.
    /// String, number, and boolean members become text fields; null and
    /// structured members are skipped. A non-object value yields an empty
    /// message.
    pub fn from_json(value: &Value) -> Self {
        let mut message = Self::new();
        if let Some(object) = value.as_object() {
            for (name, member) in object {
                match member {
                    Value::String(text) => message.set_field(name, text),
                    Value::Number(number) => message.set_field(name, number.to_string()),
                    Value::Bool(flag) => message.set_field(name, flag.to_string()),
                    Value::Null | Value::Array(_) | Value::Object(_) => {}
                }
            }
        }
        message
    }
}

impl From<BTreeMap<String, String>> for LogMessage {
    fn from(fields: BTreeMap<String, String>) -> Self {
        Self { fields }
    }
}
