//! Core value types for the automatic lighting host
//!
//! Everything the host crates and the `automatic_lighting` component pass
//! between each other lives here: [`Context`], [`EntityId`], [`State`],
//! [`Event`] and [`ServiceCall`], plus the random string helper used for
//! context ids.

mod context;
mod entity_id;
mod event;
mod random;
mod service_call;
mod state;

pub use context::Context;
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use event::{Event, EventType};
pub use random::random_string;
pub use service_call::ServiceCall;
pub use state::State;

/// State value reported for entities the state machine does not know
pub const STATE_UNKNOWN: &str = "unknown";

/// State value reported for entities that exist but cannot be reached
pub const STATE_UNAVAILABLE: &str = "unavailable";
