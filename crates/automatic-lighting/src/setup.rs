//! Entry setup

use std::sync::{Arc, Weak};

use al_config_entries::ConfigEntry;
use al_core::EntityId;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::config_flow::register_flows;
use crate::constants::DOMAIN;
use crate::entity::AutomaticLightingEntity;
use crate::error::AutomaticLightingResult;
use crate::host::HomeAssistant;

/// Build the entity for a config entry and publish its state
///
/// `current` is the entity id the entry held before a reload.
pub fn async_setup_entry(
    hass: &HomeAssistant,
    entry: &ConfigEntry,
    current: Option<&EntityId>,
) -> AutomaticLightingResult<AutomaticLightingEntity> {
    let entity = AutomaticLightingEntity::from_entry(hass, entry, current)?;
    entity.write_state(&hass.states);

    info!(
        "Set up {} ({}) with block duration {}s",
        entity.entity_id(),
        entry.entry_id,
        entity.block_duration()
    );
    Ok(entity)
}

/// The integration as loaded into a host
pub struct AutomaticLighting {
    hass: Arc<HomeAssistant>,
    /// entry_id -> entity
    entities: DashMap<String, Arc<AutomaticLightingEntity>>,
}

impl AutomaticLighting {
    /// Register flows and the entry setup handler with the host
    pub fn async_setup(hass: Arc<HomeAssistant>) -> Arc<Self> {
        let integration = Arc::new(Self {
            hass,
            entities: DashMap::new(),
        });
        register_flows(&integration.hass.flows);

        let weak: Weak<Self> = Arc::downgrade(&integration);
        integration.hass.config_entries.register_setup_handler(
            DOMAIN,
            Arc::new(move |entry: &ConfigEntry| -> Result<(), String> {
                let integration = weak
                    .upgrade()
                    .ok_or_else(|| format!("{} is no longer loaded", DOMAIN))?;
                integration.setup_entry(entry).map_err(|err| err.to_string())
            }),
        );

        debug!("Registered {} integration", DOMAIN);
        integration
    }

    fn setup_entry(&self, entry: &ConfigEntry) -> AutomaticLightingResult<()> {
        let current = self
            .entity(&entry.entry_id)
            .map(|entity| entity.entity_id().clone());
        let entity = async_setup_entry(&self.hass, entry, current.as_ref())?;
        self.entities.insert(entry.entry_id.clone(), Arc::new(entity));
        Ok(())
    }

    /// Set an entry up again, picking up changed options
    pub async fn async_reload_entry(&self, entry_id: &str) -> AutomaticLightingResult<()> {
        self.hass.config_entries.setup(entry_id).await?;
        Ok(())
    }

    pub fn entity(&self, entry_id: &str) -> Option<Arc<AutomaticLightingEntity>> {
        self.entities.get(entry_id).map(|e| e.value().clone())
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}
