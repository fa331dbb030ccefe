//! Config and options flows
//!
//! A flow is a short conversation between the user and an integration:
//! the integration shows a form, the user submits it, and the flow either
//! shows another form, creates an entry, or aborts with a reason.
//!
//! Config flows start at the `user` step and create a new [`ConfigEntry`].
//! Options flows are bound to an existing entry, start at the `init` step
//! and replace that entry's options.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use ulid::Ulid;

use crate::entry::ConfigEntry;
use crate::manager::{ConfigEntries, ConfigEntriesError};
use crate::schema::Schema;

/// First step of a config flow
pub const STEP_USER: &str = "user";
/// First step of an options flow
pub const STEP_INIT: &str = "init";

pub const ABORT_ALREADY_CONFIGURED: &str = "already_configured";

/// Submitted form data
pub type FlowInput = Map<String, Value>;

#[derive(Debug, Error)]
pub enum FlowError {
    /// Raised from a step to end the flow with a reason
    #[error("flow aborted: {reason}")]
    Abort { reason: String },

    #[error("no flow handler registered for {0}")]
    UnknownHandler(String),

    #[error("flow {0} not found")]
    UnknownFlow(String),

    #[error("flow handler has no step {0}")]
    UnknownStep(String),

    #[error("config entry {0} not found")]
    UnknownEntry(String),

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),
}

impl FlowError {
    pub fn abort(reason: impl Into<String>) -> Self {
        FlowError::Abort {
            reason: reason.into(),
        }
    }
}

/// What a step asks the manager to do next
#[derive(Debug, Clone)]
pub enum FlowStep {
    Form {
        step_id: String,
        schema: Schema,
        errors: BTreeMap<String, String>,
    },
    CreateEntry {
        title: String,
        data: FlowInput,
    },
    Abort {
        reason: String,
    },
}

impl FlowStep {
    pub fn form(step_id: impl Into<String>, schema: Schema) -> Self {
        FlowStep::Form {
            step_id: step_id.into(),
            schema,
            errors: BTreeMap::new(),
        }
    }

    pub fn create_entry(title: impl Into<String>, data: FlowInput) -> Self {
        FlowStep::CreateEntry {
            title: title.into(),
            data,
        }
    }
}

/// Per-flow information handed to every step
#[derive(Clone)]
pub struct FlowContext {
    pub flow_id: String,
    /// Integration domain
    pub handler: String,
    unique_id: Option<String>,
    entries: Arc<ConfigEntries>,
}

impl FlowContext {
    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    /// Tag the entry this flow will create; checked on creation
    pub fn set_unique_id(&mut self, unique_id: impl Into<String>) {
        self.unique_id = Some(unique_id.into());
    }

    /// Abort if an entry of this domain already has the flow's unique id
    pub fn abort_if_unique_id_configured(&self) -> Result<(), FlowError> {
        match &self.unique_id {
            Some(unique_id) if self.entries.get_by_unique_id(&self.handler, unique_id).is_some() => {
                Err(FlowError::abort(ABORT_ALREADY_CONFIGURED))
            }
            _ => Ok(()),
        }
    }
}

/// Implemented by integrations; one instance lives for one flow
#[async_trait]
pub trait FlowHandler: Send + Sync {
    /// Version stamped on entries created by this flow
    fn version(&self) -> u32 {
        1
    }

    /// Run `step_id`; `user_input` is `None` when the step is first shown
    async fn async_step(
        &mut self,
        step_id: &str,
        flow: &mut FlowContext,
        user_input: Option<FlowInput>,
    ) -> Result<FlowStep, FlowError>;
}

pub type ConfigFlowFactory = Arc<dyn Fn() -> Box<dyn FlowHandler> + Send + Sync>;

pub type OptionsFlowFactory = Arc<dyn Fn(&ConfigEntry) -> Box<dyn FlowHandler> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowResultType {
    Form,
    CreateEntry,
    Abort,
}

/// Outcome of starting or progressing a flow
#[derive(Debug, Clone, Serialize)]
pub struct FlowResult {
    pub flow_id: String,
    pub handler: String,
    #[serde(rename = "type")]
    pub result_type: FlowResultType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_schema: Option<Schema>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Entry created or updated by this flow
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<FlowInput>,
}

impl FlowResult {
    fn new(flow_id: &str, handler: &str, result_type: FlowResultType) -> Self {
        Self {
            flow_id: flow_id.to_string(),
            handler: handler.to_string(),
            result_type,
            step_id: None,
            data_schema: None,
            errors: BTreeMap::new(),
            title: None,
            reason: None,
            version: None,
            entry_id: None,
            data: None,
        }
    }

    fn abort(flow_id: &str, handler: &str, reason: String) -> Self {
        Self {
            reason: Some(reason),
            ..Self::new(flow_id, handler, FlowResultType::Abort)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.result_type != FlowResultType::Form
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FlowKind {
    Config,
    /// Options flow for this entry id
    Options(String),
}

struct ActiveFlow {
    kind: FlowKind,
    handler: Box<dyn FlowHandler>,
    context: FlowContext,
    current_step: String,
    /// Schema of the form currently shown
    schema: Option<Schema>,
}

/// Runs config and options flows for registered integrations
pub struct FlowManager {
    entries: Arc<ConfigEntries>,
    config_flows: DashMap<String, ConfigFlowFactory>,
    options_flows: DashMap<String, OptionsFlowFactory>,
    flows: Mutex<HashMap<String, ActiveFlow>>,
}

impl FlowManager {
    pub fn new(entries: Arc<ConfigEntries>) -> Self {
        Self {
            entries,
            config_flows: DashMap::new(),
            options_flows: DashMap::new(),
            flows: Mutex::new(HashMap::new()),
        }
    }

    pub fn register_config_flow(&self, domain: &str, factory: ConfigFlowFactory) {
        self.config_flows.insert(domain.to_string(), factory);
        debug!("Registered config flow for domain: {}", domain);
    }

    pub fn register_options_flow(&self, domain: &str, factory: OptionsFlowFactory) {
        self.options_flows.insert(domain.to_string(), factory);
        debug!("Registered options flow for domain: {}", domain);
    }

    /// Start a config flow for `domain` at the `user` step
    #[instrument(skip(self))]
    pub async fn start_config_flow(&self, domain: &str) -> Result<FlowResult, FlowError> {
        let factory = self
            .config_flows
            .get(domain)
            .map(|f| f.value().clone())
            .ok_or_else(|| FlowError::UnknownHandler(domain.to_string()))?;

        self.start(FlowKind::Config, domain, factory(), STEP_USER)
            .await
    }

    /// Start an options flow for an existing entry at the `init` step
    #[instrument(skip(self))]
    pub async fn start_options_flow(&self, entry_id: &str) -> Result<FlowResult, FlowError> {
        let entry = self
            .entries
            .get(entry_id)
            .ok_or_else(|| FlowError::UnknownEntry(entry_id.to_string()))?;
        let factory = self
            .options_flows
            .get(&entry.domain)
            .map(|f| f.value().clone())
            .ok_or_else(|| FlowError::UnknownHandler(entry.domain.clone()))?;

        self.start(
            FlowKind::Options(entry.entry_id.clone()),
            &entry.domain,
            factory(&entry),
            STEP_INIT,
        )
        .await
    }

    async fn start(
        &self,
        kind: FlowKind,
        domain: &str,
        handler: Box<dyn FlowHandler>,
        first_step: &str,
    ) -> Result<FlowResult, FlowError> {
        let flow_id = Ulid::new().to_string().to_lowercase();
        info!("Starting {:?} flow for {} with flow_id {}", kind, domain, flow_id);

        let flow = ActiveFlow {
            kind,
            handler,
            context: FlowContext {
                flow_id: flow_id.clone(),
                handler: domain.to_string(),
                unique_id: None,
                entries: self.entries.clone(),
            },
            current_step: first_step.to_string(),
            schema: None,
        };
        self.run_step(flow, None).await
    }

    /// Submit input for the current step of a flow
    ///
    /// Input is validated against the form last shown; invalid input
    /// re-shows that form with per-field errors and never reaches the step.
    #[instrument(skip(self, user_input))]
    pub async fn progress_flow(
        &self,
        flow_id: &str,
        user_input: Option<FlowInput>,
    ) -> Result<FlowResult, FlowError> {
        let flow = self
            .flows
            .lock()
            .await
            .remove(flow_id)
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;

        let user_input = match (user_input, flow.schema.clone()) {
            (Some(input), Some(schema)) => match schema.validate(&input) {
                Ok(valid) => Some(valid),
                Err(err) => {
                    debug!(flow_id = %flow_id, errors = ?err.errors, "Rejected flow input");
                    let result = FlowResult {
                        step_id: Some(flow.current_step.clone()),
                        data_schema: Some(schema),
                        errors: err.errors,
                        ..FlowResult::new(flow_id, &flow.context.handler, FlowResultType::Form)
                    };
                    self.flows.lock().await.insert(flow_id.to_string(), flow);
                    return Ok(result);
                }
            },
            (input, _) => input,
        };

        self.run_step(flow, user_input).await
    }

    /// Drop an in-progress flow
    pub async fn abort_flow(&self, flow_id: &str) -> Result<(), FlowError> {
        if self.flows.lock().await.remove(flow_id).is_none() {
            return Err(FlowError::UnknownFlow(flow_id.to_string()));
        }
        debug!("Aborted flow {}", flow_id);
        Ok(())
    }

    /// In-progress flows as `{flow_id, handler, step_id}`
    pub async fn list_flows(&self) -> Vec<Value> {
        self.flows
            .lock()
            .await
            .iter()
            .map(|(flow_id, flow)| {
                serde_json::json!({
                    "flow_id": flow_id,
                    "handler": flow.context.handler,
                    "step_id": flow.current_step,
                })
            })
            .collect()
    }

    async fn run_step(
        &self,
        mut flow: ActiveFlow,
        user_input: Option<FlowInput>,
    ) -> Result<FlowResult, FlowError> {
        let flow_id = flow.context.flow_id.clone();
        let domain = flow.context.handler.clone();
        let step_id = flow.current_step.clone();

        let step = match flow
            .handler
            .async_step(&step_id, &mut flow.context, user_input)
            .await
        {
            Ok(step) => step,
            Err(FlowError::Abort { reason }) => FlowStep::Abort { reason },
            Err(err) => return Err(err),
        };

        let result = match step {
            FlowStep::Form {
                step_id,
                schema,
                errors,
            } => {
                let result = FlowResult {
                    step_id: Some(step_id.clone()),
                    data_schema: Some(schema.clone()),
                    errors,
                    ..FlowResult::new(&flow_id, &domain, FlowResultType::Form)
                };
                flow.current_step = step_id;
                flow.schema = Some(schema);
                self.flows.lock().await.insert(flow_id.clone(), flow);
                result
            }
            FlowStep::CreateEntry { title, data } => match &flow.kind {
                FlowKind::Config => self.create_entry(&flow, title, data).await?,
                FlowKind::Options(entry_id) => {
                    let entry = self
                        .entries
                        .update_options(entry_id, data.clone())
                        .await?;
                    FlowResult {
                        title: Some(title),
                        entry_id: Some(entry.entry_id),
                        data: Some(data),
                        ..FlowResult::new(&flow_id, &domain, FlowResultType::CreateEntry)
                    }
                }
            },
            FlowStep::Abort { reason } => {
                info!("Flow {} for {} aborted: {}", flow_id, domain, reason);
                FlowResult::abort(&flow_id, &domain, reason)
            }
        };

        if result.is_finished() {
            debug!("Flow {} finished with {:?}", flow_id, result.result_type);
        }
        Ok(result)
    }

    async fn create_entry(
        &self,
        flow: &ActiveFlow,
        title: String,
        data: FlowInput,
    ) -> Result<FlowResult, FlowError> {
        let ctx = &flow.context;
        let mut entry = ConfigEntry::new(&ctx.handler, &title)
            .with_data(data.clone())
            .with_version(flow.handler.version());
        if let Some(unique_id) = ctx.unique_id() {
            entry = entry.with_unique_id(unique_id);
        }

        match self.entries.add(entry).await {
            Ok(entry) => Ok(FlowResult {
                title: Some(title),
                version: Some(entry.version),
                entry_id: Some(entry.entry_id),
                data: Some(data),
                ..FlowResult::new(&ctx.flow_id, &ctx.handler, FlowResultType::CreateEntry)
            }),
            // lost a race with another flow for the same unique id
            Err(ConfigEntriesError::AlreadyExists { .. }) => Ok(FlowResult::abort(
                &ctx.flow_id,
                &ctx.handler,
                ABORT_ALREADY_CONFIGURED.to_string(),
            )),
            Err(err) => Err(err.into()),
        }
    }
}
