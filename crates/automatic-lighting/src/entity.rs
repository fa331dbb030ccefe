//! The automatic lighting entity

use std::collections::HashMap;

use al_config_entries::ConfigEntry;
use al_core::{slugify, EntityId, State};
use al_state_machine::StateMachine;
use serde_json::{json, Value};

use crate::config_flow::block_duration;
use crate::constants::{ATTR_BLOCK_DURATION, ATTR_FRIENDLY_NAME, CONF_NAME, DOMAIN, STATE_IDLE};
use crate::entity_base::EntityBase;
use crate::error::{AutomaticLightingError, AutomaticLightingResult};
use crate::host::HomeAssistant;

/// One configured automatic lighting instance
pub struct AutomaticLightingEntity {
    base: EntityBase,
    entity_id: EntityId,
    entry_id: String,
    name: String,
    /// Seconds
    block_duration: i64,
}

impl AutomaticLightingEntity {
    /// Build the entity for an entry, allocating a free entity id
    ///
    /// `current` is the id this entry already holds, if any; it is kept on
    /// reload. Names that slugify to nothing fall back to the domain.
    pub fn from_entry(
        hass: &HomeAssistant,
        entry: &ConfigEntry,
        current: Option<&EntityId>,
    ) -> AutomaticLightingResult<Self> {
        let name = entry
            .data
            .get(CONF_NAME)
            .and_then(Value::as_str)
            .unwrap_or(&entry.title)
            .to_string();
        let mut object_id = slugify(&name);
        if object_id.is_empty() {
            object_id = DOMAIN.to_string();
        }
        let entity_id = hass
            .states
            .generate_entity_id(DOMAIN, &object_id, current)
            .map_err(|source| AutomaticLightingError::InvalidName {
                name: name.clone(),
                source,
            })?;

        Ok(Self {
            base: EntityBase::from_hass(name.clone(), hass),
            entity_id,
            entry_id: entry.entry_id.clone(),
            name,
            block_duration: block_duration(&entry.options),
        })
    }

    pub fn base(&self) -> &EntityBase {
        &self.base
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn block_duration(&self) -> i64 {
        self.block_duration
    }

    pub fn attributes(&self) -> HashMap<String, Value> {
        HashMap::from([
            (ATTR_BLOCK_DURATION.to_string(), json!(self.block_duration)),
            (ATTR_FRIENDLY_NAME.to_string(), json!(self.name)),
        ])
    }

    /// Publish the entity's state under an internal context
    pub fn write_state(&self, states: &StateMachine) -> State {
        states.set(
            self.entity_id.clone(),
            STATE_IDLE,
            self.attributes(),
            self.base.create_context(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_entry_reads_name_and_options() {
        let hass = HomeAssistant::new(".");
        let entry = ConfigEntry::new(DOMAIN, "Ignored")
            .with_data(json!({"name": "Front Porch"}).as_object().cloned().unwrap())
            .with_options(json!({"block_duration": 12}).as_object().cloned().unwrap());

        let entity = AutomaticLightingEntity::from_entry(&hass, &entry, None).unwrap();
        assert_eq!(entity.entity_id().to_string(), "automatic_lighting.front_porch");
        assert_eq!(entity.name(), "Front Porch");
        assert_eq!(entity.block_duration(), 12);
        assert_eq!(entity.entry_id(), entry.entry_id);
    }

    #[test]
    fn test_from_entry_falls_back_to_title() {
        let hass = HomeAssistant::new(".");
        let entity =
            AutomaticLightingEntity::from_entry(&hass, &ConfigEntry::new(DOMAIN, "Attic"), None).unwrap();

        assert_eq!(entity.name(), "Attic");
        assert_eq!(entity.attributes()[ATTR_BLOCK_DURATION], json!(60));
    }

    #[test]
    fn test_write_state_uses_internal_context() {
        let hass = HomeAssistant::new(".");
        let entity =
            AutomaticLightingEntity::from_entry(&hass, &ConfigEntry::new(DOMAIN, "Attic"), None).unwrap();

        let state = entity.write_state(&hass.states);
        assert_eq!(state.state, STATE_IDLE);
        assert!(entity.base().is_context_internal(&state.context));
    }

    #[test]
    fn test_taken_id_gets_suffix() {
        let hass = HomeAssistant::new(".");
        let first = AutomaticLightingEntity::from_entry(&hass, &ConfigEntry::new(DOMAIN, "Attic"), None)
            .unwrap();
        first.write_state(&hass.states);

        let second = AutomaticLightingEntity::from_entry(&hass, &ConfigEntry::new(DOMAIN, "attic"), None)
            .unwrap();
        assert_eq!(second.entity_id().to_string(), "automatic_lighting.attic_2");

        let again = AutomaticLightingEntity::from_entry(
            &hass,
            &ConfigEntry::new(DOMAIN, "Attic"),
            Some(first.entity_id()),
        )
        .unwrap();
        assert_eq!(again.entity_id(), first.entity_id());
    }

    #[test]
    fn test_symbol_only_name_uses_domain() {
        let hass = HomeAssistant::new(".");
        let entity = AutomaticLightingEntity::from_entry(&hass, &ConfigEntry::new(DOMAIN, "!!!"), None)
            .unwrap();

        assert_eq!(entity.entity_id().to_string(), "automatic_lighting.automatic_lighting");
        assert_eq!(entity.name(), "!!!");
    }
}
