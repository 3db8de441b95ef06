//! Collaborator seams for establishing and driving the realtime channel.
//!
//! A session fetches a short-lived credential, hands it to a
//! [`TransportConnector`], and then exchanges JSON text frames over the
//! returned [`RealtimeTransport`]. [`ChannelTransport`] and
//! [`LoopbackConnector`] provide an in-process implementation on tokio
//! channels.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::VoiceError;

/// Single-use credential for opening one realtime session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EphemeralCredential {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl EphemeralCredential {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn fetch(&self) -> Result<EphemeralCredential, VoiceError>;
}

/// Bidirectional stream of JSON text frames.
#[async_trait]
pub trait RealtimeTransport: Send {
    async fn send(&mut self, frame: String) -> Result<(), VoiceError>;

    /// Next inbound frame, or `None` once the remote side has closed.
    async fn next_frame(&mut self) -> Result<Option<String>, VoiceError>;

    /// Release the channel. Safe to call more than once.
    async fn close(&mut self);
}

#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(
        &self,
        credential: &EphemeralCredential,
    ) -> Result<Box<dyn RealtimeTransport>, VoiceError>;
}

// =============================================================================
// Static credentials
// =============================================================================

/// Hands out the same credential on every fetch.
#[derive(Debug, Clone)]
pub struct StaticCredentialProvider {
    credential: EphemeralCredential,
}

impl StaticCredentialProvider {
    pub fn new(credential: EphemeralCredential) -> Self {
        Self { credential }
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentialProvider {
    async fn fetch(&self) -> Result<EphemeralCredential, VoiceError> {
        if self.credential.value.trim().is_empty() {
            return Err(VoiceError::Credential("No ephemeral key in response".to_string()));
        }
        if self.credential.is_expired(Utc::now()) {
            return Err(VoiceError::Credential("Ephemeral key expired".to_string()));
        }
        Ok(self.credential.clone())
    }
}

// =============================================================================
// In-process channel transport
// =============================================================================

/// One end of an in-process frame channel.
#[derive(Debug)]
pub struct ChannelTransport {
    outbound: Option<mpsc::UnboundedSender<String>>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl ChannelTransport {
    /// Two connected ends: frames sent on one arrive on the other.
    pub fn pair() -> (ChannelTransport, ChannelTransport) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (
            ChannelTransport {
                outbound: Some(a_tx),
                inbound: b_rx,
            },
            ChannelTransport {
                outbound: Some(b_tx),
                inbound: a_rx,
            },
        )
    }

    pub fn is_closed(&self) -> bool {
        self.outbound.is_none()
    }
}

#[async_trait]
impl RealtimeTransport for ChannelTransport {
    async fn send(&mut self, frame: String) -> Result<(), VoiceError> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| VoiceError::Transport("Channel closed".to_string()))?;
        outbound
            .send(frame)
            .map_err(|_| VoiceError::Transport("Remote end dropped".to_string()))
    }

    async fn next_frame(&mut self) -> Result<Option<String>, VoiceError> {
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) {
        if self.outbound.take().is_some() {
            tracing::debug!("Channel transport closed");
        }
        self.inbound.close();
    }
}

/// Connector that opens a fresh [`ChannelTransport`] pair per session and
/// delivers the remote end to the receiver returned by [`LoopbackConnector::channel`].
#[derive(Debug, Clone)]
pub struct LoopbackConnector {
    remotes: mpsc::UnboundedSender<ChannelTransport>,
}

impl LoopbackConnector {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChannelTransport>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { remotes: tx }, rx)
    }
}

#[async_trait]
impl TransportConnector for LoopbackConnector {
    async fn connect(
        &self,
        credential: &EphemeralCredential,
    ) -> Result<Box<dyn RealtimeTransport>, VoiceError> {
        if credential.value.is_empty() {
            return Err(VoiceError::Negotiation("Empty credential".to_string()));
        }
        let (local, remote) = ChannelTransport::pair();
        self.remotes
            .send(remote)
            .map_err(|_| VoiceError::Negotiation("No peer is listening".to_string()))?;
        tracing::debug!("Loopback transport connected");
        Ok(Box::new(local))
    }
}
