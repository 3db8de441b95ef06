use thiserror::Error;

use relocation_core::RelocationError;
use relocation_timeline::TimelineError;

/// Failure of a single tool call.
///
/// Never escapes the dispatcher: it is reported back to the agent as a
/// `{success: false, message}` result.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Tool timed out after {0}s")]
    Timeout(u64),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Timeline(#[from] TimelineError),
}

/// Session-level failures. Any of these ends the session.
#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Negotiation failed: {0}")]
    Negotiation(String),

    #[error("Microphone unavailable: {0}")]
    MicrophoneUnavailable(String),

    #[error("Invalid session phase transition: {0}")]
    InvalidPhase(String),

    #[error("Timed out after {0}s")]
    Timeout(u64),
}

impl From<VoiceError> for RelocationError {
    fn from(err: VoiceError) -> Self {
        RelocationError::Transport(err.to_string())
    }
}
