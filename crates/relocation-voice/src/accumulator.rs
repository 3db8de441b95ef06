//! Assembly of streamed tool-call arguments.
//!
//! Fragments are keyed only by call id and concatenated in arrival order.
//! A call leaves the accumulator exactly once, when its arguments complete.

use std::collections::HashMap;

use serde_json::{Map, Value};

#[derive(Debug, Default)]
struct PendingCall {
    name: String,
    arguments: String,
}

/// A tool call whose arguments are complete and parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCall {
    pub call_id: String,
    pub name: String,
    /// Always a JSON object. Empty or malformed argument text yields `{}`.
    pub arguments: Value,
}

/// In-flight tool calls for one session.
#[derive(Debug, Default)]
pub struct CallAccumulator {
    pending: HashMap<String, PendingCall>,
}

impl CallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `call_id` invokes `name`. Fragments that arrived before
    /// the registration are kept.
    pub fn register(&mut self, call_id: &str, name: &str) {
        let call = self.pending.entry(call_id.to_string()).or_default();
        call.name = name.to_string();
        tracing::debug!(call_id, tool = name, "Tool call registered");
    }

    /// Append an argument fragment.
    pub fn append(&mut self, call_id: &str, fragment: &str) {
        self.pending
            .entry(call_id.to_string())
            .or_default()
            .arguments
            .push_str(fragment);
    }

    /// Remove the call and parse its arguments.
    ///
    /// `name` and `full_arguments` come from the completion event when it
    /// carries them. Streamed fragments take precedence over `full_arguments`.
    /// Returns `None` when the tool name is still unknown.
    pub fn complete(
        &mut self,
        call_id: &str,
        name: Option<&str>,
        full_arguments: Option<&str>,
    ) -> Option<CompletedCall> {
        let pending = self.pending.remove(call_id).unwrap_or_default();

        let name = match (pending.name.is_empty(), name) {
            (false, _) => pending.name,
            (true, Some(name)) if !name.is_empty() => name.to_string(),
            _ => {
                tracing::warn!(call_id, "Arguments completed for an unregistered tool call");
                return None;
            }
        };

        let text = if pending.arguments.trim().is_empty() {
            full_arguments.unwrap_or_default()
        } else {
            pending.arguments.as_str()
        };

        Some(CompletedCall {
            call_id: call_id.to_string(),
            arguments: parse_arguments(call_id, text),
            name,
        })
    }

    pub fn is_pending(&self, call_id: &str) -> bool {
        self.pending.contains_key(call_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop every in-flight call.
    pub fn clear(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(dropped = self.pending.len(), "Discarding pending tool calls");
        }
        self.pending.clear();
    }
}

/// Parse accumulated argument text into a JSON object.
///
/// Empty text is an empty object. Text that is not a JSON object is logged
/// and also treated as an empty object; handlers validate required fields.
pub fn parse_arguments(call_id: &str, text: &str) -> Value {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => {
            tracing::warn!(call_id, found = %other, "Tool arguments are not an object");
            Value::Object(Map::new())
        }
        Err(e) => {
            tracing::warn!(call_id, error = %e, "Malformed tool arguments");
            Value::Object(Map::new())
        }
    }
}
