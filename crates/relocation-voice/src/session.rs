//! Voice session lifecycle.
//!
//! Phases:
//! - Idle -> Connecting (start)
//! - Connecting -> Listening (transport ready, session configured)
//! - Listening <-> Thinking (agent composing a response)
//! - Listening/Thinking -> Function (tool call in flight)
//! - Function -> Listening (all calls answered)
//! - any -> Error -> Idle (transport failure, after cleanup)
//!
//! Inbound frames are handled one at a time on a single task per session,
//! so tool calls execute in completion order and never concurrently.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use relocation_core::config::VoiceConfig;
use relocation_core::events::TimelineEvent;
use relocation_core::{EventBus, SessionPhase, Timestamp};
use relocation_timeline::TimelineStore;

use crate::accumulator::{CallAccumulator, CompletedCall};
use crate::dispatcher::ToolDispatcher;
use crate::error::VoiceError;
use crate::events::RealtimeEvent;
use crate::handler::profile::route_label;
use crate::inference::infer_profile_update;
use crate::protocol::{OutboundMessage, SESSION_INSTRUCTIONS};
use crate::transport::{CredentialProvider, RealtimeTransport, TransportConnector};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// Phase state machine
// =============================================================================

/// Thread-safe session phase with validated transitions.
///
/// Every applied transition is published as
/// [`TimelineEvent::SessionPhaseChanged`].
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: Arc<Mutex<SessionPhase>>,
    events: EventBus,
}

impl PhaseMachine {
    pub fn new(events: EventBus) -> Self {
        Self {
            phase: Arc::new(Mutex::new(SessionPhase::Idle)),
            events,
        }
    }

    pub fn current(&self) -> SessionPhase {
        *lock(&self.phase)
    }

    /// Attempt to move to `target`.
    pub fn transition(&self, target: SessionPhase) -> Result<(), VoiceError> {
        let mut phase = lock(&self.phase);
        if !phase.can_transition_to(&target) {
            return Err(VoiceError::InvalidPhase(format!("{} -> {}", *phase, target)));
        }
        tracing::debug!("Voice session phase: {} -> {}", *phase, target);
        *phase = target;
        drop(phase);
        self.publish(target);
        Ok(())
    }

    /// Like [`transition`](Self::transition), but treats a redundant or
    /// out-of-order request as a no-op. Used for agent-driven events.
    pub fn advance(&self, target: SessionPhase) -> bool {
        match self.transition(target) {
            Ok(()) => true,
            Err(e) => {
                tracing::trace!(error = %e, "Ignoring phase change");
                false
            }
        }
    }

    /// Force the machine back to Idle.
    pub fn reset(&self) {
        let mut phase = lock(&self.phase);
        if *phase == SessionPhase::Idle {
            return;
        }
        if *phase != SessionPhase::Error {
            tracing::debug!("Voice session phase reset to idle from {}", *phase);
        }
        *phase = SessionPhase::Idle;
        drop(phase);
        self.publish(SessionPhase::Idle);
    }

    fn publish(&self, phase: SessionPhase) {
        self.events.publish(TimelineEvent::SessionPhaseChanged {
            phase,
            timestamp: Timestamp::now(),
        });
    }
}

// =============================================================================
// Transcript
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    User,
    Assistant,
}

/// One finished utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub id: String,
    pub role: TranscriptRole,
    pub content: String,
    pub timestamp: Timestamp,
}

// =============================================================================
// Controller
// =============================================================================

/// State shared between the controller and its session task.
struct SessionShared {
    phase: PhaseMachine,
    dispatcher: ToolDispatcher,
    transcript: Mutex<Vec<TranscriptMessage>>,
    last_error: Mutex<Option<String>>,
}

impl SessionShared {
    fn store(&self) -> &Arc<TimelineStore> {
        &self.dispatcher.context().store
    }

    fn config(&self) -> &VoiceConfig {
        &self.dispatcher.context().config
    }

    fn notify(&self, message: impl Into<String>) {
        self.dispatcher.context().notify(message);
    }

    /// Record a session-ending failure and return to Idle through Error.
    fn fail(&self, error: &VoiceError) {
        tracing::warn!(error = %error, "Voice session failed");
        *lock(&self.last_error) = Some(error.to_string());
        self.phase.advance(SessionPhase::Error);
        self.notify(format!("Voice session error: {}", error));
        self.phase.reset();
    }

    fn append_transcript(&self, role: TranscriptRole, content: &str) -> Option<String> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return None;
        }
        lock(&self.transcript).push(TranscriptMessage {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: trimmed.to_string(),
            timestamp: Timestamp::now(),
        });
        Some(trimmed.to_string())
    }
}

struct ActiveSession {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Owns at most one realtime voice session at a time.
pub struct VoiceSessionController {
    shared: Arc<SessionShared>,
    credentials: Arc<dyn CredentialProvider>,
    connector: Arc<dyn TransportConnector>,
    session: tokio::sync::Mutex<Option<ActiveSession>>,
}

impl std::fmt::Debug for VoiceSessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSessionController")
            .field("phase", &self.shared.phase.current())
            .finish()
    }
}

impl VoiceSessionController {
    pub fn new(
        dispatcher: ToolDispatcher,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn TransportConnector>,
    ) -> Self {
        let phase = PhaseMachine::new(dispatcher.context().store.events().clone());
        Self {
            shared: Arc::new(SessionShared {
                phase,
                dispatcher,
                transcript: Mutex::new(Vec::new()),
                last_error: Mutex::new(None),
            }),
            credentials,
            connector,
            session: tokio::sync::Mutex::new(None),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.shared.phase.current()
    }

    /// Message of the failure that ended the last session, if any.
    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared.last_error).clone()
    }

    pub fn transcript(&self) -> Vec<TranscriptMessage> {
        lock(&self.shared.transcript).clone()
    }

    /// True while a session task is running.
    pub async fn is_active(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    /// Open a session. A no-op unless the controller is idle.
    ///
    /// Credential fetch and transport negotiation together are bounded by
    /// `connect_timeout_secs`. On failure the controller passes through
    /// Error back to Idle and the error is returned.
    pub async fn start(&self) -> Result<(), VoiceError> {
        let mut slot = self.session.lock().await;
        let phase = self.shared.phase.current();
        if phase != SessionPhase::Idle {
            tracing::debug!(phase = %phase, "Voice session already running");
            return Ok(());
        }
        if let Some(finished) = slot.take() {
            let _ = finished.task.await;
        }
        *lock(&self.shared.last_error) = None;

        self.shared.phase.transition(SessionPhase::Connecting)?;
        let limit_secs = self.shared.config().connect_timeout_secs;
        let connected = match tokio::time::timeout(Duration::from_secs(limit_secs), self.connect()).await {
            Ok(result) => result,
            Err(_) => Err(VoiceError::Timeout(limit_secs)),
        };
        let mut transport = match connected {
            Ok(transport) => transport,
            Err(e) => {
                self.shared.fail(&e);
                return Err(e);
            }
        };

        self.shared.phase.transition(SessionPhase::Listening)?;
        let instructions = self
            .shared
            .config()
            .instructions
            .clone()
            .unwrap_or_else(|| SESSION_INSTRUCTIONS.to_string());
        let update =
            OutboundMessage::session_update(instructions, self.shared.dispatcher.registry().schemas());
        if let Err(e) = send(transport.as_mut(), &update).await {
            transport.close().await;
            self.shared.fail(&e);
            return Err(e);
        }
        self.shared.notify("Voice session connected");

        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_session(Arc::clone(&self.shared), transport, shutdown_rx));
        *slot = Some(ActiveSession { shutdown, task });
        tracing::info!(model = %self.shared.config().model, "Voice session started");
        Ok(())
    }

    async fn connect(&self) -> Result<Box<dyn RealtimeTransport>, VoiceError> {
        let credential = self.credentials.fetch().await?;
        self.connector.connect(&credential).await
    }

    /// Tear the session down. Pending tool calls are discarded; effects of
    /// calls that already ran are kept. Safe to call repeatedly.
    pub async fn stop(&self) {
        let mut slot = self.session.lock().await;
        let Some(active) = slot.take() else {
            self.shared.phase.reset();
            return;
        };
        let _ = active.shutdown.send(());
        if let Err(e) = active.task.await {
            tracing::warn!(error = %e, "Voice session task ended abnormally");
        }
        self.shared.notify("Voice session stopped");
        self.shared.phase.reset();
        tracing::info!("Voice session stopped");
    }

    /// Wait until the current session ends on its own (remote close or
    /// transport failure).
    pub async fn wait(&self) {
        let mut slot = self.session.lock().await;
        if let Some(active) = slot.take() {
            if let Err(e) = active.task.await {
                tracing::warn!(error = %e, "Voice session task ended abnormally");
            }
        }
    }
}

async fn send(transport: &mut dyn RealtimeTransport, message: &OutboundMessage) -> Result<(), VoiceError> {
    let frame = message
        .to_frame()
        .map_err(|e| VoiceError::Transport(format!("Failed to encode {}: {}", message.kind(), e)))?;
    tracing::trace!(kind = message.kind(), "Sending realtime message");
    transport.send(frame).await
}

enum Exit {
    Stopped,
    Closed,
    Failed(VoiceError),
}

async fn run_session(
    shared: Arc<SessionShared>,
    mut transport: Box<dyn RealtimeTransport>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut turn = SessionLoop {
        shared: Arc::clone(&shared),
        calls: CallAccumulator::new(),
        assistant_buffer: String::new(),
        user_buffer: String::new(),
    };

    let exit = loop {
        let frame = tokio::select! {
            _ = &mut shutdown => break Exit::Stopped,
            frame = transport.next_frame() => frame,
        };
        let event = match frame {
            Ok(Some(frame)) => RealtimeEvent::parse(&frame),
            Ok(None) => break Exit::Closed,
            Err(e) => break Exit::Failed(e),
        };
        // Stopping abandons a tool call still in flight. Whatever it already
        // applied to the store stays applied.
        tokio::select! {
            _ = &mut shutdown => break Exit::Stopped,
            handled = turn.handle(event, transport.as_mut()) => {
                if let Err(e) = handled {
                    break Exit::Failed(e);
                }
            }
        }
    };

    turn.calls.clear();
    transport.close().await;

    match exit {
        Exit::Stopped => {}
        Exit::Closed => {
            tracing::info!("Voice session ended by remote");
            shared.notify("Voice session ended");
            shared.phase.reset();
        }
        Exit::Failed(e) => shared.fail(&e),
    }
}

/// Per-session event handling state.
struct SessionLoop {
    shared: Arc<SessionShared>,
    calls: CallAccumulator,
    assistant_buffer: String,
    user_buffer: String,
}

impl SessionLoop {
    async fn handle(
        &mut self,
        event: RealtimeEvent,
        transport: &mut dyn RealtimeTransport,
    ) -> Result<(), VoiceError> {
        tracing::trace!(kind = event.kind(), "Realtime event");
        let shared = Arc::clone(&self.shared);
        let phase = &shared.phase;
        match event {
            RealtimeEvent::ResponseStarted => {
                phase.advance(SessionPhase::Thinking);
            }
            RealtimeEvent::ResponseCompleted | RealtimeEvent::AssistantDone => {
                self.flush_assistant();
                if self.calls.is_empty() {
                    phase.advance(SessionPhase::Listening);
                }
            }
            RealtimeEvent::AssistantDelta(text) => self.assistant_buffer.push_str(&text),
            RealtimeEvent::UserDelta(text) => self.user_buffer.push_str(&text),
            RealtimeEvent::UserDone(full) => {
                let buffered = std::mem::take(&mut self.user_buffer);
                self.record_user(&full.unwrap_or(buffered));
            }
            RealtimeEvent::CallRegistered { call_id, name } => {
                self.calls.register(&call_id, &name);
                phase.advance(SessionPhase::Function);
            }
            RealtimeEvent::ArgumentsDelta { call_id, delta } => {
                self.calls.append(&call_id, &delta);
            }
            RealtimeEvent::ArgumentsDone {
                call_id,
                name,
                arguments,
            } => {
                if let Some(call) = self
                    .calls
                    .complete(&call_id, name.as_deref(), arguments.as_deref())
                {
                    self.dispatch(call, transport).await?;
                }
            }
            RealtimeEvent::Error { message } => {
                tracing::warn!(message = %message, "Realtime API reported an error");
                self.shared.notify(format!("Assistant error: {}", message));
            }
            RealtimeEvent::Ignored(_) => {}
        }
        Ok(())
    }

    /// Execute one call, answer it, and ask the agent for a spoken follow-up.
    async fn dispatch(
        &mut self,
        call: CompletedCall,
        transport: &mut dyn RealtimeTransport,
    ) -> Result<(), VoiceError> {
        let phase = &self.shared.phase;
        if phase.current() != SessionPhase::Function {
            phase.advance(SessionPhase::Function);
        }

        let outcome = self.shared.dispatcher.execute(&call).await;
        send(
            transport,
            &OutboundMessage::function_call_output(&outcome.call_id, &outcome.output),
        )
        .await?;
        send(
            transport,
            &OutboundMessage::response_create(self.shared.config().follow_up_instructions.clone()),
        )
        .await?;

        if self.calls.is_empty() {
            phase.advance(SessionPhase::Listening);
        }
        Ok(())
    }

    fn flush_assistant(&mut self) {
        let text = std::mem::take(&mut self.assistant_buffer);
        self.shared.append_transcript(TranscriptRole::Assistant, &text);
    }

    /// Log a finished user utterance and learn the route from it.
    fn record_user(&mut self, text: &str) {
        let Some(content) = self.shared.append_transcript(TranscriptRole::User, text) else {
            return;
        };
        let store = self.shared.store();
        let Some(update) = infer_profile_update(&content, &store.profile()) else {
            return;
        };
        match store.set_relocation_profile(&update) {
            Ok(profile) => {
                tracing::info!(route = %route_label(&profile), "Route inferred from speech");
                self.shared
                    .notify(format!("Heard your route: {}", route_label(&profile)));
            }
            Err(e) => tracing::warn!(error = %e, "Failed to store inferred route"),
        }
    }
}
