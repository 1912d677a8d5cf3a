//! Events delivered to a machine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Symbolic name of an event kind.
pub type EventType = String;

/// An event: a symbolic name plus arbitrary key/value payload.
///
/// The name is `None` only for the session-construction sentinel produced by
/// [`Event::init`], which triggers the machine's entry transition.
///
/// # Example
///
/// ```rust
/// use statewise::core::Event;
/// use serde_json::json;
///
/// let event = Event::new("done").with("data", json!(42));
/// assert_eq!(event.name(), Some("done"));
/// assert_eq!(event.get("data"), Some(&json!(42)));
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    name: Option<EventType>,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl Event {
    /// Create an event with the given name and an empty payload.
    pub fn new(name: impl Into<EventType>) -> Self {
        Self {
            name: Some(name.into()),
            payload: Map::new(),
        }
    }

    /// The nameless sentinel that drives a session's initial transition.
    pub fn init() -> Self {
        Self::default()
    }

    /// Add a payload field, returning the updated event.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_init(&self) -> bool {
        self.name.is_none()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}

impl From<&str> for Event {
    fn from(name: &str) -> Self {
        Event::new(name)
    }
}

impl From<String> for Event {
    fn from(name: String) -> Self {
        Event::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_name_converts_into_event() {
        let event: Event = "toggle".into();
        assert_eq!(event.name(), Some("toggle"));
        assert!(event.payload().is_empty());
    }

    #[test]
    fn init_sentinel_has_no_name() {
        let event = Event::init();
        assert!(event.is_init());
        assert_eq!(event.name(), None);
    }

    #[test]
    fn event_serializes_with_type_field() {
        let event = Event::new("error").with("error", json!("boom"));
        let encoded = serde_json::to_value(&event).unwrap();
        assert_eq!(encoded, json!({ "type": "error", "error": "boom" }));

        let decoded: Event = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, event);
    }
}
