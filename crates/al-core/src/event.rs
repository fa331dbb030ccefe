//! Events published on the event bus

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Context;

const MATCH_ALL: &str = "*";

/// Name of an event, e.g. `state_changed`
///
/// The special type `*` stands for every event when subscribing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn is_match_all(&self) -> bool {
        self.0 == MATCH_ALL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fired event with its JSON payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    pub data: Value,
    pub time_fired: DateTime<Utc>,
    /// What caused the event
    pub context: Context,
}

impl Event {
    pub fn new(event_type: impl Into<EventType>, data: Value, context: Context) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            time_fired: Utc::now(),
            context,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_match_all() {
        assert!(EventType::from("*").is_match_all());
        assert!(!EventType::from("state_changed").is_match_all());
    }

    #[test]
    fn test_event_serializes_type_as_string() {
        let event = Event::new("call_service", json!({"a": 1}), Context::with_id("ctx"));
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], json!("call_service"));
        assert_eq!(value["context"]["id"], json!("ctx"));
    }
}
