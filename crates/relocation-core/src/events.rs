use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{RelocationProfile, ResearchState, ServiceId, SessionPhase, Task, Timestamp};

/// What happened to the tasks named in a highlight.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightAction {
    Created,
    Updated,
    Completed,
    Touched,
}

impl std::fmt::Display for HighlightAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HighlightAction::Created => write!(f, "created"),
            HighlightAction::Updated => write!(f, "updated"),
            HighlightAction::Completed => write!(f, "completed"),
            HighlightAction::Touched => write!(f, "touched"),
        }
    }
}

/// Change notifications published by the timeline store and the voice session.
///
/// State-carrying variants hold the complete new snapshot, never a delta, so a
/// subscriber that lags and skips messages only needs the latest one.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[non_exhaustive]
pub enum TimelineEvent {
    // =========================================================================
    // Plan state
    // =========================================================================
    ServicesChanged {
        services: Vec<ServiceId>,
        timestamp: Timestamp,
    },

    TasksUpdated {
        tasks: Vec<Task>,
        timestamp: Timestamp,
    },

    ProfileChanged {
        profile: RelocationProfile,
        timestamp: Timestamp,
    },

    /// The whole plan was cleared. Follows the empty-state events.
    PlanReset {
        timestamp: Timestamp,
    },

    // =========================================================================
    // UI side channel
    // =========================================================================
    TaskHighlight {
        ids: Vec<String>,
        action: HighlightAction,
        timestamp: Timestamp,
    },

    UiMessage {
        message: String,
        timestamp: Timestamp,
    },

    HousingSearchRequested {
        location: Option<String>,
        max_price: Option<u32>,
        bedrooms: Option<u32>,
        timestamp: Timestamp,
    },

    ResearchUpdated {
        task_id: String,
        state: ResearchState,
        timestamp: Timestamp,
    },

    SessionPhaseChanged {
        phase: SessionPhase,
        timestamp: Timestamp,
    },
}

impl TimelineEvent {
    /// Returns the timestamp associated with this event.
    pub fn timestamp(&self) -> Timestamp {
        match self {
            TimelineEvent::ServicesChanged { timestamp, .. }
            | TimelineEvent::TasksUpdated { timestamp, .. }
            | TimelineEvent::ProfileChanged { timestamp, .. }
            | TimelineEvent::PlanReset { timestamp }
            | TimelineEvent::TaskHighlight { timestamp, .. }
            | TimelineEvent::UiMessage { timestamp, .. }
            | TimelineEvent::HousingSearchRequested { timestamp, .. }
            | TimelineEvent::ResearchUpdated { timestamp, .. }
            | TimelineEvent::SessionPhaseChanged { timestamp, .. } => *timestamp,
        }
    }

    /// Stable, snake_case name of the event kind.
    pub fn event_name(&self) -> &'static str {
        match self {
            TimelineEvent::ServicesChanged { .. } => "services_changed",
            TimelineEvent::TasksUpdated { .. } => "tasks_updated",
            TimelineEvent::ProfileChanged { .. } => "profile_changed",
            TimelineEvent::PlanReset { .. } => "plan_reset",
            TimelineEvent::TaskHighlight { .. } => "task_highlight",
            TimelineEvent::UiMessage { .. } => "ui_message",
            TimelineEvent::HousingSearchRequested { .. } => "housing_search_requested",
            TimelineEvent::ResearchUpdated { .. } => "research_updated",
            TimelineEvent::SessionPhaseChanged { .. } => "session_phase_changed",
        }
    }

    pub fn ui_message(message: impl Into<String>) -> Self {
        TimelineEvent::UiMessage {
            message: message.into(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn highlight(ids: Vec<String>, action: HighlightAction) -> Self {
        TimelineEvent::TaskHighlight {
            ids,
            action,
            timestamp: Timestamp::now(),
        }
    }
}

/// Typed publish/subscribe channel for [`TimelineEvent`]s.
///
/// Cloning yields another handle to the same channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<TimelineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: TimelineEvent) {
        let name = event.event_name();
        if self.tx.send(event).is_err() {
            tracing::trace!(event = name, "No subscribers for event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TimelineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
