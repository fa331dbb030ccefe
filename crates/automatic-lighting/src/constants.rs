//! Integration constants

pub const DOMAIN: &str = "automatic_lighting";

pub const CONF_NAME: &str = "name";
pub const CONF_BLOCK_DURATION: &str = "block_duration";

/// Seconds
pub const DEFAULT_BLOCK_DURATION: i64 = 60;

/// Length of the per-entity prefix on every context id it creates
pub const CONTEXT_PREFIX_LENGTH: usize = 6;
pub const CONTEXT_MAX_LENGTH: usize = 36;

// the prefix must survive truncation to CONTEXT_MAX_LENGTH
const _: () = assert!(CONTEXT_PREFIX_LENGTH <= CONTEXT_MAX_LENGTH);

pub const STEP_USER: &str = al_config_entries::STEP_USER;
pub const STEP_INIT: &str = al_config_entries::STEP_INIT;

pub const ABORT_REASON_ALREADY_CONFIGURED: &str = al_config_entries::ABORT_ALREADY_CONFIGURED;

/// State reported by an entity once it is set up
pub const STATE_IDLE: &str = "idle";

pub const ATTR_BLOCK_DURATION: &str = CONF_BLOCK_DURATION;
pub const ATTR_FRIENDLY_NAME: &str = "friendly_name";
