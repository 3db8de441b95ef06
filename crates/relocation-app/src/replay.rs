//! Replay of recorded realtime event logs through a full voice session.

use std::sync::Arc;
use std::time::Duration;

use relocation_core::config::VoiceConfig;
use relocation_timeline::TimelineStore;
use relocation_voice::{
    EphemeralCredential, LoopbackConnector, RealtimeTransport, StaticCredentialProvider,
    ToolContext, ToolDispatcher, ToolRegistry, VoiceError, VoiceSessionController,
};

/// How long the session may stay silent before the replay is considered done.
const QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Frames of a recorded log: one JSON frame per non-blank line.
pub fn read_frames(log: &str) -> Vec<String> {
    log.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Run `frames` through a session backed by `store` and return every frame
/// the session sent, starting with its `session.update`.
pub async fn replay(
    store: Arc<TimelineStore>,
    config: VoiceConfig,
    frames: Vec<String>,
) -> Result<Vec<String>, VoiceError> {
    let context = ToolContext::new(store, config);
    let dispatcher = ToolDispatcher::new(Arc::new(ToolRegistry::with_defaults()), context);
    let (connector, mut remotes) = LoopbackConnector::channel();
    let controller = VoiceSessionController::new(
        dispatcher,
        Arc::new(StaticCredentialProvider::new(EphemeralCredential::new("replay"))),
        Arc::new(connector),
    );

    controller.start().await?;
    let mut remote = remotes
        .recv()
        .await
        .ok_or_else(|| VoiceError::Negotiation("Loopback peer missing".to_string()))?;

    tracing::info!(frames = frames.len(), "Replaying realtime event log");
    for frame in frames {
        remote.send(frame).await?;
    }

    let mut sent = Vec::new();
    while let Ok(frame) = tokio::time::timeout(QUIET_PERIOD, remote.next_frame()).await {
        match frame? {
            Some(frame) => sent.push(frame),
            None => break,
        }
    }

    controller.stop().await;
    tracing::info!(responses = sent.len(), "Replay finished");
    Ok(sent)
}
