//! Template rendering for the automatic lighting host
//!
//! A thin layer over minijinja that exposes entity states to templates:
//!
//! - `states('sensor.lux')` returns the state string (`unknown` when missing)
//! - `states.sensor.lux.state` and `states.sensor.lux.attributes.x`
//! - `is_state(entity_id, state)`, `state_attr(entity_id, name)`,
//!   `is_state_attr(entity_id, name, value)`, `has_value(entity_id)`
//! - `iif(cond, if_true, if_false)` and the `slugify` filter
//!
//! [`TemplateEngine::render_native`] turns the rendered text back into a
//! JSON value, so `"{{ 40 + 2 }}"` becomes the number `42`.

mod engine;
mod error;
mod states;

pub use engine::TemplateEngine;
pub use error::{TemplateError, TemplateResult};
pub use states::StatesObject;

pub use minijinja::Value;
