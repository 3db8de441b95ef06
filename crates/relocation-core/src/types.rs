use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Enums
// =============================================================================

/// Relocation service category. The catalog is fixed at build time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceId {
    Housing,
    Immigration,
    Moving,
    Finances,
    Settling,
}

impl ServiceId {
    /// Every service id, in catalog order.
    pub const ALL: [ServiceId; 5] = [
        ServiceId::Housing,
        ServiceId::Immigration,
        ServiceId::Moving,
        ServiceId::Finances,
        ServiceId::Settling,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceId::Housing => "housing",
            ServiceId::Immigration => "immigration",
            ServiceId::Moving => "moving",
            ServiceId::Finances => "finances",
            ServiceId::Settling => "settling",
        }
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceId {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "housing" => Ok(ServiceId::Housing),
            "immigration" => Ok(ServiceId::Immigration),
            "moving" => Ok(ServiceId::Moving),
            "finances" => Ok(ServiceId::Finances),
            "settling" => Ok(ServiceId::Settling),
            _ => Err(format!("Unknown service id: {}", s)),
        }
    }
}

/// Checklist status of a task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// Status of the research query backing a task's research action.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
    #[default]
    Idle,
    Pending,
    InProgress,
    Complete,
    Failed,
}

impl ResearchStatus {
    /// Whether the backing query may still change status.
    pub fn is_active(&self) -> bool {
        matches!(self, ResearchStatus::Pending | ResearchStatus::InProgress)
    }
}

/// Lifecycle phase of a voice session.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Connecting,
    Listening,
    Thinking,
    Function,
    Error,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionPhase::Idle => write!(f, "idle"),
            SessionPhase::Connecting => write!(f, "connecting"),
            SessionPhase::Listening => write!(f, "listening"),
            SessionPhase::Thinking => write!(f, "thinking"),
            SessionPhase::Function => write!(f, "function"),
            SessionPhase::Error => write!(f, "error"),
        }
    }
}

impl SessionPhase {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionPhase) -> bool {
        matches!(
            (self, target),
            (SessionPhase::Idle, SessionPhase::Connecting)
                | (SessionPhase::Connecting, SessionPhase::Listening)
                | (SessionPhase::Listening, SessionPhase::Thinking)
                | (SessionPhase::Thinking, SessionPhase::Listening)
                | (SessionPhase::Listening, SessionPhase::Function)
                | (SessionPhase::Thinking, SessionPhase::Function)
                | (SessionPhase::Function, SessionPhase::Thinking)
                | (SessionPhase::Function, SessionPhase::Listening)
                // Teardown
                | (_, SessionPhase::Error)
                | (_, SessionPhase::Idle)
        ) && self != target
    }
}

// =============================================================================
// Newtype Wrappers
// =============================================================================

/// Wall-clock instant in Unix milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt.timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }
}

// =============================================================================
// Task actions
// =============================================================================

/// File upload affordance attached to a task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accept: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

/// Appointment booking affordance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cta_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calendar_hint: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
}

/// Web research prompt. `default_query` may carry `{{placeholder}}` tokens.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Rental listing search affordance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HousingSearchAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
}

/// Interactive affordance attached to a task.
///
/// Every variant has a stable de-duplication key: `<type>:<id>`, falling back
/// to a slug of the label (or note text) when no id is set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskAction {
    Upload(UploadAction),
    Booking(BookingAction),
    Link(LinkAction),
    Note(NoteAction),
    Research(ResearchAction),
    HousingSearch(HousingSearchAction),
}

impl TaskAction {
    /// Wire name of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskAction::Upload(_) => "upload",
            TaskAction::Booking(_) => "booking",
            TaskAction::Link(_) => "link",
            TaskAction::Note(_) => "note",
            TaskAction::Research(_) => "research",
            TaskAction::HousingSearch(_) => "housing_search",
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            TaskAction::Upload(a) => a.id.as_deref(),
            TaskAction::Booking(a) => a.id.as_deref(),
            TaskAction::Link(a) => a.id.as_deref(),
            TaskAction::Note(a) => a.id.as_deref(),
            TaskAction::Research(a) => a.id.as_deref(),
            TaskAction::HousingSearch(a) => a.id.as_deref(),
        }
    }

    /// Human-facing label. Notes have no label and use their text.
    pub fn label(&self) -> &str {
        match self {
            TaskAction::Upload(a) => &a.label,
            TaskAction::Booking(a) => &a.label,
            TaskAction::Link(a) => &a.label,
            TaskAction::Note(a) => &a.text,
            TaskAction::Research(a) => &a.label,
            TaskAction::HousingSearch(a) => &a.label,
        }
    }

    pub fn is_research(&self) -> bool {
        matches!(self, TaskAction::Research(_))
    }

    pub fn dedup_key(&self) -> String {
        let discriminator = match self.id() {
            Some(id) if !id.trim().is_empty() => id.to_string(),
            _ => slugify(self.label()),
        };
        format!("{}:{}", self.kind(), discriminator)
    }

    /// Returns a copy with `render` applied to every free-text field.
    ///
    /// Ids are left untouched so the de-duplication key stays stable.
    pub fn map_text<F>(&self, render: F) -> TaskAction
    where
        F: Fn(&str) -> String,
    {
        let opt = |value: &Option<String>| value.as_deref().map(&render);
        match self {
            TaskAction::Upload(a) => TaskAction::Upload(UploadAction {
                id: a.id.clone(),
                label: render(&a.label),
                accept: a.accept.clone(),
                instructions: opt(&a.instructions),
            }),
            TaskAction::Booking(a) => TaskAction::Booking(BookingAction {
                id: a.id.clone(),
                label: render(&a.label),
                cta_label: opt(&a.cta_label),
                instructions: opt(&a.instructions),
                calendar_hint: opt(&a.calendar_hint),
            }),
            TaskAction::Link(a) => TaskAction::Link(LinkAction {
                id: a.id.clone(),
                label: render(&a.label),
                url: a.url.clone(),
            }),
            TaskAction::Note(a) => TaskAction::Note(NoteAction {
                id: a.id.clone(),
                text: render(&a.text),
            }),
            TaskAction::Research(a) => TaskAction::Research(ResearchAction {
                id: a.id.clone(),
                label: render(&a.label),
                default_query: opt(&a.default_query),
                hint: opt(&a.hint),
                placeholder: opt(&a.placeholder),
            }),
            TaskAction::HousingSearch(a) => TaskAction::HousingSearch(HousingSearchAction {
                id: a.id.clone(),
                label: render(&a.label),
                instructions: opt(&a.instructions),
                location: opt(&a.location),
                max_price: a.max_price,
                bedrooms: a.bedrooms,
            }),
        }
    }
}

/// Lowercase, hyphen-separated form of `text` used for ids and keys.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

// =============================================================================
// Domain Structs
// =============================================================================

/// Extra label/value line rendered under a task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtraInfo {
    pub label: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

/// Status of the latest research query started from a task.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_query_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_query: Option<String>,
    #[serde(default)]
    pub status: ResearchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
}

/// A single checklist item belonging to a service.
///
/// `id` is unique across the whole plan. `sequence` only orders tasks that
/// share a `service_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub service_id: ServiceId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub timeframe: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_info: Vec<ExtraInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<TaskAction>,
    /// De-duplication keys of the actions attached by enrichment rules.
    /// These are re-rendered on every pass; other actions are left alone.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rule_actions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub research_state: Option<ResearchState>,
}

impl Task {
    pub fn research_action_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_research()).count()
    }

    /// Look up an attached action by its de-duplication key or id.
    pub fn find_action(&self, id_or_key: &str) -> Option<&TaskAction> {
        self.actions
            .iter()
            .find(|a| a.id() == Some(id_or_key) || a.dedup_key() == id_or_key)
    }
}

/// Partial field update for a task, as sent by the voice agent.
///
/// Field names are accepted in camelCase and snake_case.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, alias = "service_id", skip_serializing_if = "Option::is_none")]
    pub service_id: Option<ServiceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u32>,
    #[serde(default, alias = "extra_info", skip_serializing_if = "Option::is_none")]
    pub extra_info: Option<Vec<ExtraInfo>>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }

    /// Overwrite the fields present in the patch and stamp `last_updated_at`.
    pub fn apply_to(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(timeframe) = &self.timeframe {
            task.timeframe = timeframe.clone();
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(service_id) = self.service_id {
            task.service_id = service_id;
        }
        if let Some(sequence) = self.sequence {
            task.sequence = sequence;
        }
        if let Some(extra_info) = &self.extra_info {
            task.extra_info = extra_info.clone();
        }
        task.last_updated_at = Some(Timestamp::now());
    }
}

/// Origin, destination, and target date of the move.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocationProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_at: Option<Timestamp>,
}

impl RelocationProfile {
    pub fn is_empty(&self) -> bool {
        self.from_city.is_none() && self.to_city.is_none() && self.move_date.is_none()
    }

    /// Shallow merge: fields absent from `update` keep their current value.
    pub fn merged(&self, update: &ProfileUpdate) -> RelocationProfile {
        RelocationProfile {
            from_city: update.from_city.clone().or_else(|| self.from_city.clone()),
            to_city: update.to_city.clone().or_else(|| self.to_city.clone()),
            move_date: update.move_date.clone().or_else(|| self.move_date.clone()),
            last_updated_at: Some(Timestamp::now()),
        }
    }
}

/// Partial relocation profile update.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub move_date: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.from_city.is_none() && self.to_city.is_none() && self.move_date.is_none()
    }
}

// =============================================================================
// Tests
// =============================================================================
