//! Entity helpers shared by automatic lighting entities
//!
//! [`EntityBase`] gives an entity two things:
//!
//! - context tagging: every context it creates starts with a random prefix
//!   fixed for the lifetime of the instance, so the entity can tell its own
//!   actions apart when they come back as state changes or events;
//! - template-aware service calls: string arguments that contain template
//!   markup are rendered against the current states before dispatch.
//!
//! Recognizing a context by its prefix is a heuristic. Two instances that
//! draw the same six characters would claim each other's actions.

use std::sync::{Arc, Mutex, PoisonError};

use al_core::{random_string, Context};
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::constants::{CONTEXT_MAX_LENGTH, CONTEXT_PREFIX_LENGTH};
use crate::host::{EventFirer, HomeAssistant, ServiceCaller, TemplateRenderer};

pub struct EntityBase {
    /// Used in log output
    name: String,
    context_prefix: String,
    /// Context of the entity's latest action
    context: Mutex<Option<Context>>,
    templates: Arc<dyn TemplateRenderer>,
    services: Arc<dyn ServiceCaller>,
    events: Arc<dyn EventFirer>,
}

impl EntityBase {
    pub fn new(
        name: impl Into<String>,
        templates: Arc<dyn TemplateRenderer>,
        services: Arc<dyn ServiceCaller>,
        events: Arc<dyn EventFirer>,
    ) -> Self {
        Self {
            name: name.into(),
            context_prefix: random_string(CONTEXT_PREFIX_LENGTH),
            context: Mutex::new(None),
            templates,
            services,
            events,
        }
    }

    /// Build against a host instance
    pub fn from_hass(name: impl Into<String>, hass: &HomeAssistant) -> Self {
        Self::new(
            name,
            hass.templates.clone(),
            hass.services.clone(),
            hass.bus.clone(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context_prefix(&self) -> &str {
        &self.context_prefix
    }

    /// Context of the most recent service call or event, if any
    pub fn context(&self) -> Option<Context> {
        self.context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_context(&self, context: Context) {
        *self.context.lock().unwrap_or_else(PoisonError::into_inner) = Some(context);
    }

    /// New context whose id carries this entity's prefix
    ///
    /// Ids are always exactly [`CONTEXT_MAX_LENGTH`] characters.
    pub fn create_context(&self) -> Context {
        let mut id = format!(
            "{}{}",
            self.context_prefix,
            random_string(CONTEXT_MAX_LENGTH)
        );
        id.truncate(CONTEXT_MAX_LENGTH);
        Context::with_id(id)
    }

    /// Whether a context was created by this instance
    pub fn is_context_internal(&self, context: &Context) -> bool {
        context.id.starts_with(&self.context_prefix)
    }

    /// Render template strings in service data
    ///
    /// Non-template values pass through as is. A value that fails to render
    /// is logged and its key left out of the result.
    pub fn render_service_data(&self, service_data: &Map<String, Value>) -> Map<String, Value> {
        let mut rendered = Map::with_capacity(service_data.len());

        for (key, value) in service_data {
            match value {
                Value::String(template) if self.templates.is_template(template) => {
                    match self.templates.render(template) {
                        Ok(result) => {
                            rendered.insert(key.clone(), result);
                        }
                        Err(err) => {
                            let bundle = Value::Object(service_data.clone());
                            warn!(
                                entity = %self.name,
                                key = %key,
                                service_data = %bundle,
                                template = %template,
                                error = %err,
                                "Invalid template in service data, leaving the key out"
                            );
                        }
                    }
                }
                _ => {
                    rendered.insert(key.clone(), value.clone());
                }
            }
        }

        rendered
    }

    /// Call a service with rendered data under a fresh internal context
    ///
    /// Dispatch runs on a spawned task and its failures are only logged.
    /// Awaiting the returned handle is optional. Must be called from within
    /// a tokio runtime.
    pub fn call_service(
        &self,
        domain: &str,
        service: &str,
        service_data: Map<String, Value>,
    ) -> JoinHandle<()> {
        let context = self.create_context();
        self.set_context(context.clone());

        let data = Value::Object(self.render_service_data(&service_data));
        let services = self.services.clone();
        let entity = self.name.clone();
        let domain = domain.to_string();
        let service = service.to_string();

        debug!(entity = %entity, context_id = %context.id, "Calling {}.{}", domain, service);
        tokio::spawn(async move {
            if let Err(err) = services.call(&domain, &service, data, context).await {
                warn!(entity = %entity, "Service call {}.{} failed: {}", domain, service, err);
            }
        })
    }

    /// Fire an event with the data unchanged under a fresh internal context
    pub fn fire_event(&self, event_type: &str, event_data: Map<String, Value>) {
        let context = self.create_context();
        self.set_context(context.clone());

        debug!(entity = %self.name, context_id = %context.id, "Firing {}", event_type);
        self.events.fire(event_type, Value::Object(event_data), context);
    }
}
