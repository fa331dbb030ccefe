//! Config Entries
//!
//! Configuration records for integrations and the flows that create and
//! edit them.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - One configured integration instance
//! - [`ConfigEntries`] - Store and lifecycle manager for all entries
//! - [`Schema`] - Form schema with field validation
//! - [`FlowManager`] - Runs config flows and options flows step by step
//! - [`FlowHandler`] - Implemented by integrations for each flow
//!
//! # Storage
//!
//! Entries are persisted in `.storage/core.config_entries` with version
//! tracking.

pub mod entry;
pub mod flow;
pub mod manager;
pub mod schema;
pub mod storage;

pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState};
pub use flow::{
    FlowContext, FlowError, FlowHandler, FlowInput, FlowManager, FlowResult, FlowResultType,
    FlowStep, ABORT_ALREADY_CONFIGURED, STEP_INIT, STEP_USER,
};
pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, SetupHandler,
    STORAGE_KEY, STORAGE_MINOR_VERSION, STORAGE_VERSION,
};
pub use schema::{Field, FieldType, Schema, SchemaError};
pub use storage::{Storage, StorageError, StorageFile, StorageResult};
