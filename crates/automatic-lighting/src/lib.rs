//! Automatic Lighting
//!
//! Integration that lets a named automatic lighting instance be configured
//! from the UI and gives its entities helpers for tagging and recognizing
//! their own actions and for calling services with templated data.
//!
//! # Key Types
//!
//! - [`ConfigFlow`] / [`OptionsFlow`] - Name setup and block duration options
//! - [`EntityBase`] - Context tagging and template-aware service calls
//! - [`AutomaticLightingEntity`] - Entity created for each config entry
//! - [`AutomaticLighting`] - Registers the integration with a host

pub mod config_flow;
pub mod constants;
pub mod entity;
pub mod entity_base;
pub mod error;
pub mod host;
pub mod setup;

pub use config_flow::{block_duration, register_flows, ConfigFlow, OptionsFlow};
pub use entity::AutomaticLightingEntity;
pub use entity_base::EntityBase;
pub use error::{AutomaticLightingError, AutomaticLightingResult};
pub use host::{EventFirer, HomeAssistant, ServiceCaller, TemplateRenderer};
pub use setup::{async_setup_entry, AutomaticLighting};
