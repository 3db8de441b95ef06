//! Relocation Timeline crate - the plan state and everything that shapes it.
//!
//! Resolves spoken service names to catalog ids, instantiates tasks from
//! per-service templates, attaches interactive actions through enrichment
//! rules, and owns the authoritative `TimelineStore` snapshot.

pub mod enrichment;
pub mod error;
pub mod research;
pub mod resolver;
pub mod store;
pub mod templates;

pub use enrichment::placeholders::{build_suggested_query, country_for_city, PlaceholderValues};
pub use enrichment::{enrich_task, enrich_tasks, EnrichmentRule};
pub use error::TimelineError;
pub use research::{ResearchCoordinator, ResearchQueryStatus, ResearchResult, ResearchService};
pub use resolver::{normalize_phrase, resolve_service, resolve_services};
pub use store::{TimelineSnapshot, TimelineStore};
pub use templates::{instantiate, templates_for, TaskTemplate};
