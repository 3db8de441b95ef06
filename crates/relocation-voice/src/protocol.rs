//! Outbound realtime messages and the built-in session instructions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default behavioral instructions sent with `session.update`.
pub const SESSION_INSTRUCTIONS: &str = "\
You are Gullie, a relocation voice specialist helping a user who is moving between two cities.
- Keep answers short and friendly, and speak English.
- Open by greeting the user with their route: \"Hi, I see that you have a move started from {from_city} to {to_city}.\"
- At the start of every session call get_relocation() and list_selected_services().
- Review recent progress with list_tasks(status=\"in_progress\", limit=5) and ask for updates.
- Ask a single discovery question at a time about immigration, housing, shipping, finances, or schooling.
- As soon as the user names or confirms their origin or destination, call set_relocation_profile({ from_city, to_city, move_date? }).
- When the user hints at a need, call navigate_view(\"timeline\") and then select_services with canonical service ids.
- After a service is selected, call add_service_tasks({ serviceId }) so its tasks appear right away.
- Call navigate_view(\"timeline\") before changing services and navigate_view(\"dashboard\") before changing tasks.
- Summarize what changed out loud after every tool call.
- When the user reports finished work, call complete_tasks or update_tasks, including any dependent tasks.
- For housing help, call open_housing_search with the city and any budget or bedroom count mentioned.
- Finish every spoken reply with a short next-step question.
- Refer back to what the user said earlier when it is relevant.
- Never queue several questions; ask one and wait.";

/// Session settings carried by `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub instructions: String,
    pub modalities: Vec<String>,
    pub tool_choice: String,
    pub tools: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRequest {
    pub instructions: String,
}

/// Messages the client sends on the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Tool result. `output` is the JSON result encoded as a string.
    #[serde(rename = "response.function_call_output")]
    FunctionCallOutput { call_id: String, output: String },

    #[serde(rename = "response.create")]
    ResponseCreate { response: ResponseRequest },
}

impl OutboundMessage {
    pub fn session_update(instructions: impl Into<String>, tools: Vec<Value>) -> Self {
        OutboundMessage::SessionUpdate {
            session: SessionConfig {
                instructions: instructions.into(),
                modalities: vec!["audio".to_string(), "text".to_string()],
                tool_choice: "auto".to_string(),
                tools,
            },
        }
    }

    pub fn function_call_output(call_id: impl Into<String>, output: &Value) -> Self {
        OutboundMessage::FunctionCallOutput {
            call_id: call_id.into(),
            output: output.to_string(),
        }
    }

    pub fn response_create(instructions: impl Into<String>) -> Self {
        OutboundMessage::ResponseCreate {
            response: ResponseRequest {
                instructions: instructions.into(),
            },
        }
    }

    /// Wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::SessionUpdate { .. } => "session.update",
            OutboundMessage::FunctionCallOutput { .. } => "response.function_call_output",
            OutboundMessage::ResponseCreate { .. } => "response.create",
        }
    }

    /// Encode as one text frame.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_update_wire_shape() {
        let message = OutboundMessage::session_update("Be brief.", vec![json!({"name": "t"})]);
        let wire: Value = serde_json::from_str(&message.to_frame().unwrap()).unwrap();
        assert_eq!(
            wire,
            json!({
                "type": "session.update",
                "session": {
                    "instructions": "Be brief.",
                    "modalities": ["audio", "text"],
                    "tool_choice": "auto",
                    "tools": [{"name": "t"}]
                }
            })
        );
    }

    #[test]
    fn test_function_call_output_encodes_result_as_string() {
        let message =
            OutboundMessage::function_call_output("call_7", &json!({"success": true, "updated": 2}));
        let wire: Value = serde_json::from_str(&message.to_frame().unwrap()).unwrap();
        assert_eq!(wire["type"], "response.function_call_output");
        assert_eq!(wire["call_id"], "call_7");
        let inner: Value = serde_json::from_str(wire["output"].as_str().unwrap()).unwrap();
        assert_eq!(inner["updated"], 2);
    }

    #[test]
    fn test_frames_decode_back() {
        let message = OutboundMessage::response_create("Provide a concise spoken update.");
        let decoded: OutboundMessage = serde_json::from_str(&message.to_frame().unwrap()).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.kind(), "response.create");
    }

    #[test]
    fn test_instructions_mention_every_session_opener() {
        for tool in ["get_relocation", "list_selected_services", "list_tasks"] {
            assert!(SESSION_INSTRUCTIONS.contains(tool), "missing {}", tool);
        }
    }
}
