//! Per-service task templates and task instantiation.

use relocation_core::{ServiceId, Task, TaskStatus, Timestamp};
use uuid::Uuid;

/// Catalog blueprint for one task of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskTemplate {
    pub slug: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub timeframe: &'static str,
    pub default_status: Option<TaskStatus>,
}

const fn template(
    slug: &'static str,
    title: &'static str,
    description: &'static str,
    timeframe: &'static str,
) -> TaskTemplate {
    TaskTemplate {
        slug,
        title,
        description,
        timeframe,
        default_status: None,
    }
}

static HOUSING: [TaskTemplate; 3] = [
    template(
        "discover-neighborhoods",
        "Map out destination neighborhoods",
        "Pin the areas that match commute, school, and lifestyle goals so we can focus the search.",
        "Kickoff",
    ),
    template(
        "schedule-viewings",
        "Schedule housing tours",
        "Coordinate virtual or in-person walkthroughs for the top properties.",
        "Week 1",
    ),
    template(
        "lease-checklist",
        "Review lease essentials",
        "Confirm move-in dates, deposits, and onboarding instructions with the landlord or agent.",
        "Week 2",
    ),
];

static IMMIGRATION: [TaskTemplate; 3] = [
    TaskTemplate {
        slug: "document-audit",
        title: "Collect visa documentation",
        description:
            "Gather passports, contracts, and dependent records needed for the immigration filing.",
        timeframe: "Kickoff",
        default_status: Some(TaskStatus::InProgress),
    },
    template(
        "biometrics-booking",
        "Book biometrics appointment",
        "Reserve the earliest slot that aligns with travel plans and processing timelines.",
        "Week 1",
    ),
    template(
        "arrival-notification",
        "Plan arrival registration",
        "Note the location and documents required for in-country registration or police check-in.",
        "Landing",
    ),
];

static MOVING: [TaskTemplate; 3] = [
    template(
        "inventory",
        "Create move inventory",
        "List the key household items and note fragile shipment requirements.",
        "Kickoff",
    ),
    template(
        "shippers",
        "Lock in international movers",
        "Compare quotes, confirm insurance coverage, and secure pack-out dates.",
        "Week 2",
    ),
    template(
        "travel-plan",
        "Align travel logistics",
        "Sync flights, temporary housing check-in, and arrival coordination with the movers.",
        "Week 3",
    ),
];

static FINANCES: [TaskTemplate; 3] = [
    template(
        "bank-account",
        "Open destination bank account",
        "Prepare documentation and schedule a remote or in-branch appointment.",
        "Week 1",
    ),
    template(
        "budget",
        "Publish relocation budget tracker",
        "Share stipend usage, reimbursements, and upcoming expenses.",
        "Week 2",
    ),
    template(
        "tax-briefing",
        "Plan tax briefing",
        "Confirm payroll implications and schedule a session with the tax advisor.",
        "Week 3",
    ),
];

static SETTLING: [TaskTemplate; 3] = [
    template(
        "welcome-pack",
        "Send newcomer welcome pack",
        "Provide guides covering healthcare, transport, and key local registrations.",
        "Landing",
    ),
    template(
        "schools",
        "Shortlist schools and childcare",
        "Collect enrollment requirements and orientation dates for the family.",
        "Week 2",
    ),
    template(
        "utilities",
        "Activate utilities concierge",
        "Line up electricity, internet, and mobile services ahead of move-in.",
        "Week 3",
    ),
];

/// Templates for `service`, in the order tasks are created.
pub fn templates_for(service: ServiceId) -> &'static [TaskTemplate] {
    match service {
        ServiceId::Housing => &HOUSING,
        ServiceId::Immigration => &IMMIGRATION,
        ServiceId::Moving => &MOVING,
        ServiceId::Finances => &FINANCES,
        ServiceId::Settling => &SETTLING,
    }
}

/// Create a fresh task from a template.
///
/// Ids have the form `task-<service>-<slug>-<8 hex chars>`.
pub fn instantiate(service: ServiceId, template: &TaskTemplate, sequence: u32) -> Task {
    let suffix = Uuid::new_v4().simple().to_string();
    Task {
        id: format!("task-{}-{}-{}", service, template.slug, &suffix[..8]),
        service_id: service,
        title: template.title.to_string(),
        description: template.description.to_string(),
        timeframe: template.timeframe.to_string(),
        status: template.default_status.unwrap_or_default(),
        sequence,
        last_updated_at: Some(Timestamp::now()),
        template_slug: Some(template.slug.to_string()),
        extra_info: Vec::new(),
        actions: Vec::new(),
        rule_actions: Vec::new(),
        research_state: None,
    }
}

/// Templates of `service` not yet represented in `existing`, paired with the
/// sequence number each new task should take.
///
/// A template is represented when a task of the same service carries its
/// slug, or has its title and no slug at all.
pub fn missing_templates(service: ServiceId, existing: &[Task]) -> Vec<(&'static TaskTemplate, u32)> {
    let service_tasks: Vec<&Task> = existing.iter().filter(|t| t.service_id == service).collect();
    let mut next_sequence = service_tasks
        .iter()
        .map(|t| t.sequence)
        .max()
        .unwrap_or(0)
        .max(service_tasks.len() as u32);

    templates_for(service)
        .iter()
        .filter(|template| {
            !service_tasks.iter().any(|task| match &task.template_slug {
                Some(slug) => slug == template.slug,
                None => task.title == template.title,
            })
        })
        .map(|template| {
            next_sequence += 1;
            (template, next_sequence)
        })
        .collect()
}
