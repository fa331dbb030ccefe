//! The `states` object and state helper functions exposed to templates

use al_core::{State, STATE_UNKNOWN};
use al_state_machine::StateMachine;
use minijinja::value::{Object, ObjectRepr, Value};
use minijinja::{Error, ErrorKind};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Read-only view of the state machine for templates
///
/// Callable as `states('light.kitchen')` and indexable as
/// `states.light.kitchen` or `states['light.kitchen']`.
#[derive(Clone)]
pub struct StatesObject {
    state_machine: Arc<StateMachine>,
}

impl std::fmt::Debug for StatesObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatesObject").finish_non_exhaustive()
    }
}

impl StatesObject {
    pub fn new(state_machine: Arc<StateMachine>) -> Self {
        Self { state_machine }
    }

    /// State string of an entity, `unknown` if it does not exist
    pub fn state_of(&self, entity_id: &str) -> String {
        self.state_machine
            .get_state(entity_id)
            .unwrap_or_else(|| STATE_UNKNOWN.to_string())
    }

    pub fn is_state(&self, entity_id: &str, state: &Value) -> bool {
        let Some(current) = self.state_machine.get_state(entity_id) else {
            return false;
        };
        if let Some(expected) = state.as_str() {
            return current == expected;
        }
        // a list of accepted states
        state
            .try_iter()
            .map(|mut iter| iter.any(|v| v.as_str() == Some(current.as_str())))
            .unwrap_or(false)
    }

    pub fn state_attr(&self, entity_id: &str, attribute: &str) -> Value {
        self.state_machine
            .get(entity_id)
            .and_then(|s| s.attributes.get(attribute).map(Value::from_serialize))
            .unwrap_or(Value::from(()))
    }

    pub fn is_state_attr(&self, entity_id: &str, attribute: &str, value: &Value) -> bool {
        let actual = self.state_attr(entity_id, attribute);
        !actual.is_none() && &actual == value
    }

    pub fn has_value(&self, entity_id: &str) -> bool {
        self.state_machine
            .get(entity_id)
            .map(|s| s.has_value())
            .unwrap_or(false)
    }
}

/// Template-facing shape of a state
fn state_to_value(state: &State) -> Value {
    Value::from_serialize(json!({
        "entity_id": state.entity_id.to_string(),
        "domain": state.entity_id.domain(),
        "object_id": state.entity_id.object_id(),
        "name": state
            .attributes
            .get("friendly_name")
            .and_then(|v| v.as_str())
            .unwrap_or(state.entity_id.object_id()),
        "state": state.state,
        "attributes": state.attributes,
        "last_changed": state.last_changed.to_rfc3339(),
        "last_updated": state.last_updated.to_rfc3339(),
    }))
}

impl Object for StatesObject {
    fn repr(self: &Arc<Self>) -> ObjectRepr {
        ObjectRepr::Plain
    }

    fn get_value(self: &Arc<Self>, key: &Value) -> Option<Value> {
        let key = key.as_str()?;

        if key.contains('.') {
            return self.state_machine.get(key).map(|s| state_to_value(&s));
        }

        // states.<domain> maps object ids to states
        let domain: BTreeMap<String, Value> = self
            .state_machine
            .domain_states(key)
            .iter()
            .map(|s| (s.entity_id.object_id().to_string(), state_to_value(s)))
            .collect();
        Some(Value::from_object(domain))
    }

    fn call(self: &Arc<Self>, _state: &minijinja::State, args: &[Value]) -> Result<Value, Error> {
        let entity_id = args.first().and_then(|v| v.as_str()).ok_or_else(|| {
            Error::new(ErrorKind::InvalidOperation, "states() requires an entity_id")
        })?;
        Ok(Value::from(self.state_of(entity_id)))
    }
}
