//! Built-in enrichment rules.

use std::sync::LazyLock;

use relocation_core::{
    BookingAction, HousingSearchAction, NoteAction, ResearchAction, ServiceId, TaskAction,
    UploadAction,
};

use super::EnrichmentRule;

fn research(id: &str, label: &str, query: &str, hint: Option<&str>) -> TaskAction {
    TaskAction::Research(ResearchAction {
        id: Some(id.to_string()),
        label: label.to_string(),
        default_query: Some(query.to_string()),
        hint: hint.map(String::from),
        placeholder: None,
    })
}

fn booking(id: &str, label: &str, cta: &str, instructions: &str, hint: &str) -> TaskAction {
    TaskAction::Booking(BookingAction {
        id: Some(id.to_string()),
        label: label.to_string(),
        cta_label: Some(cta.to_string()),
        instructions: Some(instructions.to_string()),
        calendar_hint: Some(hint.to_string()),
    })
}

fn upload(id: &str, label: &str, accept: &str, instructions: &str) -> TaskAction {
    TaskAction::Upload(UploadAction {
        id: Some(id.to_string()),
        label: label.to_string(),
        accept: Some(accept.to_string()),
        instructions: Some(instructions.to_string()),
    })
}

fn note(id: &str, text: &str) -> TaskAction {
    TaskAction::Note(NoteAction {
        id: Some(id.to_string()),
        text: text.to_string(),
    })
}

pub(crate) static DEFAULT_RULES: LazyLock<Vec<EnrichmentRule>> = LazyLock::new(|| {
    vec![
        // ---------------------------------------------------------------- housing
        EnrichmentRule::for_template(
            "discover-neighborhoods",
            vec![research(
                "neighborhood-research-insights",
                "Research neighborhood insights",
                "Family-friendly neighborhoods in {{destination_city}} with international schools and easy transit",
                None,
            )],
        ),
        EnrichmentRule::for_template(
            "schedule-viewings",
            vec![
                research(
                    "tour-research-tips",
                    "Find recent virtual tour tips",
                    "Best practices for virtual apartment tours in {{destination_city}} {{current_year}}",
                    None,
                ),
                booking(
                    "tour-booking-slot",
                    "Book tour slot",
                    "Confirm tour time",
                    "Choose a time that works for the relocating family and share it with the agent.",
                    "Tours are typically scheduled between 09:00 and 18:00 local time.",
                ),
            ],
        ),
        EnrichmentRule::for_template(
            "lease-checklist",
            vec![
                research(
                    "lease-research-insights",
                    "Research destination rental insights",
                    "Current rental market insights for family-friendly neighborhoods in {{destination_city}}",
                    Some("Pull recent articles or listings to compare pricing with the assigned budget."),
                ),
                research(
                    "lease-research-tenant-rights",
                    "Check tenant protections",
                    "Tenant rights and standard lease terms in {{destination_country}} {{current_year}}",
                    None,
                ),
                TaskAction::HousingSearch(HousingSearchAction {
                    id: Some("lease-housing-search".to_string()),
                    label: "Browse rental listings".to_string(),
                    instructions: Some(
                        "Search live listings in {{destination_city}} that fit the housing budget."
                            .to_string(),
                    ),
                    location: Some("{{destination_city}}".to_string()),
                    max_price: None,
                    bedrooms: None,
                }),
            ],
        ),
        EnrichmentRule {
            service_id: Some(ServiceId::Housing),
            actions: vec![research(
                "housing-cost-research",
                "Compare housing costs",
                "Average rent and deposit norms in {{destination_city}} {{destination_country}} {{current_year}}",
                None,
            )],
            ..Default::default()
        },
        // ------------------------------------------------------------ immigration
        EnrichmentRule {
            template_slug: Some("document-audit"),
            title: Some("Collect immigration packet"),
            actions: vec![
                research(
                    "immigration-packet-research",
                    "Check latest visa guidance",
                    "Latest {{destination_country}} work visa documentation requirements for {{origin_country}} citizens {{current_year}}",
                    None,
                ),
                upload(
                    "immigration-packet-upload",
                    "Upload visa documents",
                    ".pdf,.png,.jpg",
                    "Attach passport scans, employment letters, and dependent documentation.",
                ),
            ],
            ..Default::default()
        },
        EnrichmentRule::for_template(
            "biometrics-booking",
            vec![
                research(
                    "biometrics-research-prep",
                    "Biometrics appointment prep",
                    "How to prepare for {{destination_country}} visa biometrics appointment {{current_year}}",
                    None,
                ),
                booking(
                    "biometrics-booking-slot",
                    "Schedule biometrics appointment",
                    "Book appointment",
                    "Pick a slot that leaves time for document review and travel logistics.",
                    "Biometrics offices operate Monday to Friday, 08:00-16:00.",
                ),
            ],
        ),
        EnrichmentRule::for_template(
            "arrival-notification",
            vec![note(
                "arrival-registration-note",
                "Bring your passport, rental contract, and visa approval to the {{destination_city}} registration office.",
            )],
        ),
        EnrichmentRule {
            id: Some("task-immigration-appointment"),
            actions: vec![booking(
                "immigration-consultant-calendar",
                "Book immigration consultant call",
                "Schedule meeting",
                "Select a meeting time that works for the employee and the consultant.",
                "Consultations are typically 30 minutes and offered in the destination time zone.",
            )],
            ..Default::default()
        },
        // ----------------------------------------------------------------- moving
        EnrichmentRule::for_template(
            "inventory",
            vec![upload(
                "moving-upload-inventory",
                "Upload inventory photos",
                ".jpg,.png,.pdf",
                "Share photos or files that document items for movers and insurance.",
            )],
        ),
        EnrichmentRule::for_template(
            "shippers",
            vec![
                research(
                    "moving-research-companies",
                    "Moving company research",
                    "Best international moving companies from {{origin_city}} to {{destination_city}} {{current_year}}",
                    None,
                ),
                booking(
                    "packout-booking",
                    "Schedule pack-out crew",
                    "Confirm pack-out date",
                    "Coordinate the visit window with building access and elevator reservations.",
                    "Pack-out crews book quickly. Hold at least a three-hour window.",
                ),
            ],
        ),
        // --------------------------------------------------------------- finances
        EnrichmentRule::for_template(
            "bank-account",
            vec![
                research(
                    "bank-account-research",
                    "Compare newcomer bank accounts",
                    "Best banks for newcomers opening an account in {{destination_country}} {{current_year}}",
                    None,
                ),
                booking(
                    "bank-account-appointment",
                    "Book branch appointment",
                    "Reserve appointment",
                    "Bring your passport, proof of address, and employment contract.",
                    "Most branches offer appointments on weekdays between 09:00 and 17:00.",
                ),
            ],
        ),
        EnrichmentRule::for_template(
            "tax-briefing",
            vec![booking(
                "tax-advisor-session",
                "Book tax advisor session",
                "Schedule session",
                "Pick a time before the first payroll run in the destination country.",
                "Sessions usually last 45 minutes.",
            )],
        ),
        // --------------------------------------------------------------- settling
        EnrichmentRule::for_template(
            "schools",
            vec![research(
                "schools-research",
                "Research international schools",
                "International schools and childcare options in {{destination_city}} with {{current_year}} enrollment dates",
                None,
            )],
        ),
    ]
});
