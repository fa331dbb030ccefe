//! Host boundary
//!
//! [`EntityBase`](crate::EntityBase) reaches the host only through these
//! traits, so entities can be built against the in-process host crates or
//! against test doubles.

use std::path::Path;
use std::sync::Arc;

use al_config_entries::{ConfigEntries, FlowManager, Storage};
use al_core::Context;
use al_event_bus::EventBus;
use al_service_registry::{ServiceRegistry, ServiceResult};
use al_state_machine::StateMachine;
use al_template::{TemplateEngine, TemplateError};
use async_trait::async_trait;
use serde_json::Value;

/// Detects and renders template strings
pub trait TemplateRenderer: Send + Sync {
    fn is_template(&self, value: &str) -> bool;

    /// Render to a native JSON value
    fn render(&self, template: &str) -> Result<Value, TemplateError>;
}

impl TemplateRenderer for TemplateEngine {
    fn is_template(&self, value: &str) -> bool {
        TemplateEngine::is_template(value)
    }

    fn render(&self, template: &str) -> Result<Value, TemplateError> {
        self.render_native(template)
    }
}

/// Dispatches service calls
#[async_trait]
pub trait ServiceCaller: Send + Sync {
    async fn call(
        &self,
        domain: &str,
        service: &str,
        service_data: Value,
        context: Context,
    ) -> ServiceResult;
}

#[async_trait]
impl ServiceCaller for ServiceRegistry {
    async fn call(
        &self,
        domain: &str,
        service: &str,
        service_data: Value,
        context: Context,
    ) -> ServiceResult {
        ServiceRegistry::call(self, domain, service, service_data, context).await
    }
}

/// Publishes events on the bus
pub trait EventFirer: Send + Sync {
    fn fire(&self, event_type: &str, event_data: Value, context: Context);
}

impl EventFirer for EventBus {
    fn fire(&self, event_type: &str, event_data: Value, context: Context) {
        self.fire_data(event_type, event_data, context);
    }
}

/// The host instance integrations are set up against
pub struct HomeAssistant {
    /// Event bus for pub/sub communication
    pub bus: Arc<EventBus>,
    /// State machine for entity states
    pub states: Arc<StateMachine>,
    /// Service registry for service calls
    pub services: Arc<ServiceRegistry>,
    pub templates: Arc<TemplateEngine>,
    pub config_entries: Arc<ConfigEntries>,
    pub flows: Arc<FlowManager>,
}

impl HomeAssistant {
    /// Create a host whose persistent data lives under `config_dir`
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateMachine::new(bus.clone()));
        let services = Arc::new(ServiceRegistry::new());
        let templates = Arc::new(TemplateEngine::new(states.clone()));
        let config_entries = Arc::new(ConfigEntries::new(Arc::new(Storage::new(config_dir))));
        let flows = Arc::new(FlowManager::new(config_entries.clone()));

        Self {
            bus,
            states,
            services,
            templates,
            config_entries,
            flows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use al_core::EntityId;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_template_engine_renders_native_values() {
        let hass = HomeAssistant::new(".");
        hass.states.set(
            EntityId::new("sensor", "lux").unwrap(),
            "120",
            HashMap::new(),
            Context::new(),
        );
        let renderer: &dyn TemplateRenderer = hass.templates.as_ref();

        assert!(renderer.is_template("{{ states('sensor.lux') }}"));
        assert!(!renderer.is_template("sensor.lux"));
        assert_eq!(renderer.render("{{ states('sensor.lux') }}").unwrap(), json!(120));
        assert_eq!(renderer.render("{{ 'on' }}").unwrap(), json!("on"));
    }

    #[tokio::test]
    async fn test_service_registry_as_caller() {
        let hass = HomeAssistant::new(".");
        hass.services
            .register("light", "turn_on", |call| async move { Ok(Some(call.service_data)) });
        let caller: Arc<dyn ServiceCaller> = hass.services.clone();

        let result = caller
            .call("light", "turn_on", json!({"brightness": 10}), Context::new())
            .await
            .unwrap();
        assert_eq!(result, Some(json!({"brightness": 10})));
        assert!(caller
            .call("light", "missing", json!({}), Context::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_event_bus_as_firer() {
        let hass = HomeAssistant::new(".");
        let mut rx = hass.bus.subscribe("custom");
        let context = Context::with_id("abc");

        EventFirer::fire(hass.bus.as_ref(), "custom", json!({"a": 1}), context.clone());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.data, json!({"a": 1}));
        assert_eq!(event.context, context);
    }
}
