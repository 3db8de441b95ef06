//! Spoken service phrase resolution.
//!
//! Phrases are normalized and then matched exactly, first against a curated
//! synonym table and then against names derived from the service catalog.
//! There is no typo tolerance.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use relocation_core::{ServiceId, SERVICES};

/// Curated domain phrases. Consulted before the catalog.
const SYNONYMS: &[(&str, ServiceId)] = &[
    ("visa", ServiceId::Immigration),
    ("visas", ServiceId::Immigration),
    ("work permit", ServiceId::Immigration),
    ("permit", ServiceId::Immigration),
    ("immigration", ServiceId::Immigration),
    ("immigration support", ServiceId::Immigration),
    ("visa support", ServiceId::Immigration),
    ("housing", ServiceId::Housing),
    ("long term housing", ServiceId::Housing),
    ("long-term housing", ServiceId::Housing),
    ("apartment search", ServiceId::Housing),
    ("apartment", ServiceId::Housing),
    ("rent", ServiceId::Housing),
    ("rental", ServiceId::Housing),
    ("lease", ServiceId::Housing),
    // Short stays belong to settling in, not the long-term housing search.
    ("temporary housing", ServiceId::Settling),
    ("temp housing", ServiceId::Settling),
    ("temporary accommodation", ServiceId::Settling),
    ("short term accommodation", ServiceId::Settling),
    ("short-term accommodation", ServiceId::Settling),
    ("moving", ServiceId::Moving),
    ("move logistics", ServiceId::Moving),
    ("movers", ServiceId::Moving),
    ("shipping", ServiceId::Moving),
    ("ship furniture", ServiceId::Moving),
    ("moving company", ServiceId::Moving),
    ("finance", ServiceId::Finances),
    ("finances", ServiceId::Finances),
    ("banking", ServiceId::Finances),
    ("bank account", ServiceId::Finances),
    ("budget", ServiceId::Finances),
    ("open bank account", ServiceId::Finances),
    ("settling", ServiceId::Settling),
    ("lifestyle", ServiceId::Settling),
    ("community", ServiceId::Settling),
    ("schools", ServiceId::Settling),
    ("school", ServiceId::Settling),
    ("education", ServiceId::Settling),
    ("children", ServiceId::Settling),
    ("kids", ServiceId::Settling),
    ("pets", ServiceId::Settling),
    ("pet relocation", ServiceId::Settling),
];

static SYNONYM_TABLE: LazyLock<HashMap<String, ServiceId>> = LazyLock::new(|| {
    SYNONYMS
        .iter()
        .map(|(phrase, id)| (normalize_phrase(phrase), *id))
        .collect()
});

static CATALOG_TABLE: LazyLock<HashMap<String, ServiceId>> = LazyLock::new(|| {
    let mut table = HashMap::new();
    for service in SERVICES.iter() {
        let label = service.label;
        let variants = [
            service.id.as_str().to_string(),
            label.to_string(),
            format!("{} service", label),
            format!("{} tasks", label),
            label.strip_suffix("ing").unwrap_or(label).to_string(),
        ];
        for variant in variants {
            table.insert(normalize_phrase(&variant), service.id);
        }
    }
    table
});

/// Lowercase, spell out `&`, collapse every run of other characters to one
/// space, and trim.
pub fn normalize_phrase(text: &str) -> String {
    let lowered = text.to_lowercase().replace('&', " and ");
    lowered
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolve a single phrase.
pub fn resolve_service(candidate: &str) -> Option<ServiceId> {
    let key = normalize_phrase(candidate);
    if key.is_empty() {
        return None;
    }
    SYNONYM_TABLE
        .get(&key)
        .or_else(|| CATALOG_TABLE.get(&key))
        .copied()
}

/// Resolve every phrase, silently dropping the ones that match nothing.
pub fn resolve_services<S: AsRef<str>>(candidates: &[S]) -> BTreeSet<ServiceId> {
    candidates
        .iter()
        .filter_map(|candidate| resolve_service(candidate.as_ref()))
        .collect()
}
