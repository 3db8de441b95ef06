//! Execution of completed tool calls.
//!
//! Every call produces exactly one result object. Handler errors, unknown
//! tools, and timeouts are converted into `{success: false, message}` here
//! and never reach the session loop.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::accumulator::CompletedCall;
use crate::args::ToolArguments;
use crate::error::ToolError;
use crate::handler::{failure, ToolContext, ToolRegistry};

/// Result of one tool call, ready to be sent back to the agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutcome {
    pub call_id: String,
    pub name: String,
    pub output: Value,
}

impl ToolOutcome {
    /// False when the output carries `success: false`.
    pub fn succeeded(&self) -> bool {
        self.output.get("success").and_then(Value::as_bool) != Some(false)
    }
}

pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    context: ToolContext,
    timeout: Duration,
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("tools", &self.registry.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>, context: ToolContext) -> Self {
        let timeout = Duration::from_secs(context.config.tool_timeout_secs);
        Self {
            registry,
            context,
            timeout,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Run `call` and produce its result object.
    pub async fn execute(&self, call: &CompletedCall) -> ToolOutcome {
        tracing::info!(call_id = %call.call_id, tool = %call.name, "Executing tool call");

        let output = match self.run(call).await {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(call_id = %call.call_id, tool = %call.name, error = %e, "Tool call failed");
                failure(e.to_string())
            }
        };

        let outcome = ToolOutcome {
            call_id: call.call_id.clone(),
            name: call.name.clone(),
            output,
        };
        tracing::debug!(
            call_id = %outcome.call_id,
            success = outcome.succeeded(),
            "Tool call finished"
        );
        outcome
    }

    async fn run(&self, call: &CompletedCall) -> Result<Value, ToolError> {
        let handler = self
            .registry
            .get(&call.name)
            .ok_or_else(|| ToolError::UnknownTool(call.name.clone()))?;
        let args = ToolArguments::canonicalize(call.arguments.clone(), handler.aliases());

        match tokio::time::timeout(self.timeout, handler.execute(&self.context, &args)).await {
            Ok(result) => result,
            Err(_) => Err(ToolError::Timeout(self.timeout.as_secs())),
        }
    }
}
