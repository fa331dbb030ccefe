//! Config flow and options flow
//!
//! Setting up asks for a name, which must be unique among automatic
//! lighting entries. The options flow edits the block duration.

use std::sync::Arc;

use al_config_entries::{
    ConfigEntry, Field, FieldType, FlowContext, FlowError, FlowHandler, FlowInput, FlowManager,
    FlowStep, Schema,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use crate::constants::{
    CONF_BLOCK_DURATION, CONF_NAME, DEFAULT_BLOCK_DURATION, DOMAIN, STEP_INIT, STEP_USER,
};

/// Register both flows for the domain
pub fn register_flows(flows: &FlowManager) {
    flows.register_config_flow(
        DOMAIN,
        Arc::new(|| Box::new(ConfigFlow) as Box<dyn FlowHandler>),
    );
    flows.register_options_flow(
        DOMAIN,
        Arc::new(|entry: &ConfigEntry| Box::new(OptionsFlow::new(entry)) as Box<dyn FlowHandler>),
    );
}

/// Block duration stored in an entry's options, or the default
pub fn block_duration(options: &Map<String, Value>) -> i64 {
    options
        .get(CONF_BLOCK_DURATION)
        .and_then(Value::as_i64)
        .unwrap_or(DEFAULT_BLOCK_DURATION)
}

pub struct ConfigFlow;

impl ConfigFlow {
    pub const VERSION: u32 = 1;

    async fn async_step_user(
        &mut self,
        flow: &mut FlowContext,
        user_input: Option<FlowInput>,
    ) -> Result<FlowStep, FlowError> {
        let Some(input) = user_input else {
            return Ok(FlowStep::form(
                STEP_USER,
                Schema::new().field(Field::required(CONF_NAME, FieldType::String)),
            ));
        };

        let name = input
            .get(CONF_NAME)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        flow.set_unique_id(name.clone());
        flow.abort_if_unique_id_configured()?;

        debug!("Creating {} entry for {}", DOMAIN, name);
        Ok(FlowStep::create_entry(name, input))
    }
}

#[async_trait]
impl FlowHandler for ConfigFlow {
    fn version(&self) -> u32 {
        Self::VERSION
    }

    async fn async_step(
        &mut self,
        step_id: &str,
        flow: &mut FlowContext,
        user_input: Option<FlowInput>,
    ) -> Result<FlowStep, FlowError> {
        match step_id {
            STEP_USER => self.async_step_user(flow, user_input).await,
            other => Err(FlowError::UnknownStep(other.to_string())),
        }
    }
}

pub struct OptionsFlow {
    /// Options of the entry when the flow started
    options: Map<String, Value>,
}

impl OptionsFlow {
    pub fn new(entry: &ConfigEntry) -> Self {
        Self {
            options: entry.options.clone(),
        }
    }

    async fn async_step_init(
        &mut self,
        user_input: Option<FlowInput>,
    ) -> Result<FlowStep, FlowError> {
        if let Some(input) = user_input {
            return Ok(FlowStep::create_entry("", input));
        }

        let schema = Schema::new().field(
            Field::required(
                CONF_BLOCK_DURATION,
                FieldType::Integer {
                    min: Some(0),
                    max: None,
                },
            )
            .with_default(block_duration(&self.options)),
        );
        Ok(FlowStep::form(STEP_INIT, schema))
    }
}

#[async_trait]
impl FlowHandler for OptionsFlow {
    async fn async_step(
        &mut self,
        step_id: &str,
        _flow: &mut FlowContext,
        user_input: Option<FlowInput>,
    ) -> Result<FlowStep, FlowError> {
        match step_id {
            STEP_INIT => self.async_step_init(user_input).await,
            other => Err(FlowError::UnknownStep(other.to_string())),
        }
    }
}
