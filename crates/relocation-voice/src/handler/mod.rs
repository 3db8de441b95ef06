//! Tool handlers invoked by the voice agent.
//!
//! Each tool is a unit struct implementing [`ToolHandler`]. Handlers act
//! through the [`TimelineStore`] held by the shared [`ToolContext`] and
//! return a JSON result for the agent. Expected failures (no matching
//! service, unknown task) are returned as `{success: false, message}`
//! results; `Err` is reserved for failures the handler cannot describe.

pub mod housing;
pub mod profile;
pub mod services;
pub mod tasks;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use relocation_core::config::VoiceConfig;
use relocation_core::events::{HighlightAction, TimelineEvent};
use relocation_core::ServiceId;
use relocation_timeline::TimelineStore;

use crate::args::{AliasGroup, ToolArguments};
use crate::error::ToolError;
use housing::HousingSearchService;

/// A tool the voice agent can call.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Name the agent uses to call the tool.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    /// Argument aliases folded into canonical names before `execute`.
    fn aliases(&self) -> &'static [AliasGroup] {
        &[]
    }

    async fn execute(&self, ctx: &ToolContext, args: &ToolArguments) -> Result<Value, ToolError>;

    /// Entry for the `tools` list of the session configuration.
    fn schema(&self) -> Value {
        json!({
            "type": "function",
            "name": self.name(),
            "description": self.description(),
            "parameters": self.parameters(),
        })
    }
}

/// Everything a handler may touch.
#[derive(Clone)]
pub struct ToolContext {
    pub store: Arc<TimelineStore>,
    pub housing: Option<Arc<dyn HousingSearchService>>,
    pub config: VoiceConfig,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("store", &self.store)
            .field("housing", &self.housing.is_some())
            .finish()
    }
}

impl ToolContext {
    pub fn new(store: Arc<TimelineStore>, config: VoiceConfig) -> Self {
        Self {
            store,
            housing: None,
            config,
        }
    }

    pub fn with_housing(mut self, housing: Arc<dyn HousingSearchService>) -> Self {
        self.housing = Some(housing);
        self
    }

    /// Publish a user-facing status line.
    pub fn notify(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(message = %message, "Assistant UI message");
        self.store.events().publish(TimelineEvent::ui_message(message));
    }

    pub fn highlight(&self, ids: Vec<String>, action: HighlightAction) {
        if ids.is_empty() {
            return;
        }
        self.store
            .events()
            .publish(TimelineEvent::highlight(ids, action));
    }
}

/// The structured failure result returned to the agent.
pub fn failure(message: impl Into<String>) -> Value {
    json!({ "success": false, "message": message.into() })
}

pub(crate) fn join_ids(ids: &[ServiceId]) -> String {
    ids.iter()
        .map(ServiceId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Name-indexed set of tool handlers, in registration order.
#[derive(Default)]
pub struct ToolRegistry {
    handlers: Vec<Arc<dyn ToolHandler>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in tool.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(services::NavigateViewHandler));
        registry.register(Arc::new(services::ListSelectedServicesHandler));
        registry.register(Arc::new(services::SelectServicesHandler));
        registry.register(Arc::new(services::AddServiceTasksHandler));
        registry.register(Arc::new(services::UnselectServicesHandler));
        registry.register(Arc::new(tasks::ListTasksHandler));
        registry.register(Arc::new(tasks::UpdateTasksHandler));
        registry.register(Arc::new(tasks::CompleteTasksHandler));
        registry.register(Arc::new(tasks::EditTaskHandler));
        registry.register(Arc::new(tasks::ToggleTaskHandler));
        registry.register(Arc::new(housing::OpenHousingSearchHandler));
        registry.register(Arc::new(profile::GetRelocationHandler));
        registry.register(Arc::new(profile::SetRelocationProfileHandler));
        registry
    }

    /// Add a handler, replacing any handler with the same name.
    pub fn register(&mut self, handler: Arc<dyn ToolHandler>) {
        match self.handlers.iter_mut().find(|h| h.name() == handler.name()) {
            Some(existing) => {
                tracing::debug!(tool = handler.name(), "Replacing tool handler");
                *existing = handler;
            }
            None => self.handlers.push(handler),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.iter().find(|h| h.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Tool catalog for the session configuration.
    pub fn schemas(&self) -> Vec<Value> {
        self.handlers.iter().map(|h| h.schema()).collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
