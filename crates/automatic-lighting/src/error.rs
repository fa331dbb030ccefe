//! Automatic lighting error types

use al_config_entries::ConfigEntriesError;
use al_core::EntityIdError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutomaticLightingError {
    #[error("invalid name '{name}': {source}")]
    InvalidName {
        name: String,
        #[source]
        source: EntityIdError,
    },

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),
}

pub type AutomaticLightingResult<T> = Result<T, AutomaticLightingError>;
