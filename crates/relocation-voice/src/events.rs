//! Normalization of inbound realtime events.
//!
//! The realtime API has shipped several spellings for the same event over
//! time. Every known spelling is mapped here onto one [`RealtimeEvent`]
//! variant, so the session loop never matches on raw tags.

use serde_json::Value;

/// Inbound event after tag normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// The agent started composing a response.
    ResponseStarted,
    /// The agent finished its response.
    ResponseCompleted,
    /// A fragment of assistant text, transcript, or refusal.
    AssistantDelta(String),
    /// The assistant text stream is complete.
    AssistantDone,
    /// A fragment of the user's transcribed speech.
    UserDelta(String),
    /// The user transcript is complete. Carries the full text when the
    /// event includes it.
    UserDone(Option<String>),
    /// A tool call was announced.
    CallRegistered { call_id: String, name: String },
    /// A fragment of a tool call's argument text.
    ArgumentsDelta { call_id: String, delta: String },
    /// A tool call's arguments are complete.
    ArgumentsDone {
        call_id: String,
        name: Option<String>,
        arguments: Option<String>,
    },
    /// Server-reported error.
    Error { message: String },
    /// Recognized envelope with an unhandled or incomplete tag.
    Ignored(String),
}

impl RealtimeEvent {
    /// Parse one raw transport frame.
    ///
    /// Frames that are not JSON objects come back as [`RealtimeEvent::Ignored`].
    pub fn parse(frame: &str) -> RealtimeEvent {
        match serde_json::from_str::<Value>(frame) {
            Ok(payload) => Self::from_json(&payload),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse realtime frame");
                RealtimeEvent::Ignored("<malformed>".to_string())
            }
        }
    }

    pub fn from_json(payload: &Value) -> RealtimeEvent {
        let tag = str_field(payload, "type").unwrap_or_default();
        let event = match tag {
            "response.created" => RealtimeEvent::ResponseStarted,
            "response.completed" | "response.done" => RealtimeEvent::ResponseCompleted,

            "response.output_text.delta"
            | "response.text.delta"
            | "response.audio_transcript.delta"
            | "response.refusal.delta" => {
                RealtimeEvent::AssistantDelta(first_str(payload, &["delta", "text"]))
            }
            "response.output_text.done"
            | "response.text.done"
            | "response.audio_transcript.done"
            | "response.refusal.done" => RealtimeEvent::AssistantDone,

            "response.input_text.delta" | "conversation.item.input_audio_transcription.delta" => {
                RealtimeEvent::UserDelta(first_str(payload, &["text", "delta", "transcript"]))
            }
            "response.input_text.done"
            | "conversation.item.input_audio_transcription.completed" => {
                let full = first_str(payload, &["transcript", "text"]);
                RealtimeEvent::UserDone((!full.is_empty()).then_some(full))
            }

            "response.function_call" => match (
                str_field(payload, "call_id"),
                str_field(payload, "name"),
            ) {
                (Some(call_id), Some(name)) => RealtimeEvent::CallRegistered {
                    call_id: call_id.to_string(),
                    name: name.to_string(),
                },
                _ => RealtimeEvent::Ignored(tag.to_string()),
            },
            "response.output_item.added" => {
                let item = payload.get("item").unwrap_or(&Value::Null);
                match (
                    str_field(item, "type"),
                    str_field(item, "call_id"),
                    str_field(item, "name"),
                ) {
                    (Some("function_call"), Some(call_id), Some(name)) => {
                        RealtimeEvent::CallRegistered {
                            call_id: call_id.to_string(),
                            name: name.to_string(),
                        }
                    }
                    _ => RealtimeEvent::Ignored(tag.to_string()),
                }
            }

            "response.function_call_arguments.delta" | "response.function_call.arguments.delta" => {
                match str_field(payload, "call_id") {
                    Some(call_id) => RealtimeEvent::ArgumentsDelta {
                        call_id: call_id.to_string(),
                        delta: first_str(payload, &["delta", "arguments"]),
                    },
                    None => RealtimeEvent::Ignored(tag.to_string()),
                }
            }
            "response.function_call_arguments.done" | "response.function_call.arguments.done" => {
                match str_field(payload, "call_id") {
                    Some(call_id) => RealtimeEvent::ArgumentsDone {
                        call_id: call_id.to_string(),
                        name: str_field(payload, "name").map(String::from),
                        arguments: str_field(payload, "arguments").map(String::from),
                    },
                    None => RealtimeEvent::Ignored(tag.to_string()),
                }
            }

            "error" => {
                let message = payload
                    .get("error")
                    .and_then(|e| str_field(e, "message"))
                    .or_else(|| str_field(payload, "message"))
                    .unwrap_or("Unknown realtime error");
                RealtimeEvent::Error {
                    message: message.to_string(),
                }
            }

            other => RealtimeEvent::Ignored(other.to_string()),
        };

        if let RealtimeEvent::Ignored(tag) = &event {
            tracing::trace!(tag = %tag, "Ignoring realtime event");
        }
        event
    }

    /// Stable name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            RealtimeEvent::ResponseStarted => "response_started",
            RealtimeEvent::ResponseCompleted => "response_completed",
            RealtimeEvent::AssistantDelta(_) => "assistant_delta",
            RealtimeEvent::AssistantDone => "assistant_done",
            RealtimeEvent::UserDelta(_) => "user_delta",
            RealtimeEvent::UserDone(_) => "user_done",
            RealtimeEvent::CallRegistered { .. } => "call_registered",
            RealtimeEvent::ArgumentsDelta { .. } => "arguments_delta",
            RealtimeEvent::ArgumentsDone { .. } => "arguments_done",
            RealtimeEvent::Error { .. } => "error",
            RealtimeEvent::Ignored(_) => "ignored",
        }
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn first_str(value: &Value, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| str_field(value, key))
        .unwrap_or_default()
        .to_string()
}
