//! Entity state storage for the automatic lighting host
//!
//! Holds the latest [`State`] of every entity, keeps a per-domain index and
//! announces every write as a `state_changed` event.

use al_core::{Context, EntityId, EntityIdError, State};
use al_event_bus::EventBus;
use dashmap::DashMap;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Event fired after every state write
pub const EVENT_STATE_CHANGED: &str = "state_changed";

pub struct StateMachine {
    states: DashMap<String, State>,
    domain_index: DashMap<String, Vec<String>>,
    event_bus: Arc<EventBus>,
}

impl StateMachine {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            domain_index: DashMap::new(),
            event_bus,
        }
    }

    /// Write the state of an entity and fire `state_changed`
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> State {
        let key = entity_id.to_string();
        let old_state = self.get(&key);

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes, context.clone()),
            None => State::new(entity_id.clone(), state, attributes, context.clone()),
        };
        debug!(state = %new_state.state, "Setting entity state");

        self.states.insert(key.clone(), new_state.clone());
        if old_state.is_none() {
            self.domain_index
                .entry(entity_id.domain().to_string())
                .or_default()
                .push(key.clone());
        }

        self.event_bus.fire_data(
            EVENT_STATE_CHANGED,
            json!({
                "entity_id": key,
                "old_state": old_state,
                "new_state": new_state,
            }),
            context,
        );

        new_state
    }

    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Just the state value of an entity
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    pub fn entity_ids(&self, domain: &str) -> Vec<String> {
        self.domain_index
            .get(domain)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    pub fn domain_states(&self, domain: &str) -> Vec<State> {
        self.entity_ids(domain)
            .iter()
            .filter_map(|id| self.get(id))
            .collect()
    }

    /// First free entity id for `domain.suggested_object_id`
    ///
    /// A taken id gets `_2`, `_3`, ... appended. `current` is an id the
    /// caller already holds and counts as free.
    pub fn generate_entity_id(
        &self,
        domain: &str,
        suggested_object_id: &str,
        current: Option<&EntityId>,
    ) -> Result<EntityId, EntityIdError> {
        let is_free = |candidate: &EntityId| {
            current == Some(candidate) || !self.states.contains_key(&candidate.to_string())
        };

        let preferred = EntityId::new(domain, suggested_object_id)?;
        if is_free(&preferred) {
            return Ok(preferred);
        }

        let mut tries = 1;
        loop {
            tries += 1;
            let candidate = EntityId::new(domain, format!("{}_{}", suggested_object_id, tries))?;
            if is_free(&candidate) {
                debug!(entity_id = %candidate, "Preferred entity id taken, using suffix");
                return Ok(candidate);
            }
        }
    }
}
