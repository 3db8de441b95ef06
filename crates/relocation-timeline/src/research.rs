//! Integration with the external research collaborator.
//!
//! The collaborator runs web searches and summarization; this module only
//! starts queries for a task's research action, records the query id in the
//! task's `ResearchState`, and polls status on request. Failures are recorded
//! as `failed` and never retried automatically.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use relocation_core::{ResearchAction, ResearchState, ResearchStatus, TaskAction, Timestamp};

use crate::enrichment::placeholders::build_suggested_query;
use crate::error::TimelineError;
use crate::store::TimelineStore;

/// One search hit returned by the collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchResult {
    pub title: String,
    pub summary: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Status report for a running or finished query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchQueryStatus {
    pub status: ResearchStatus,
    #[serde(default)]
    pub results: Vec<ResearchResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Web research backend.
#[async_trait]
pub trait ResearchService: Send + Sync {
    /// Start a query and return its opaque id.
    async fn start(&self, task_id: &str, query: &str) -> Result<String, TimelineError>;

    async fn status(&self, query_id: &str) -> Result<ResearchQueryStatus, TimelineError>;
}

/// Starts and polls research queries on behalf of tasks.
pub struct ResearchCoordinator {
    service: Arc<dyn ResearchService>,
    store: Arc<TimelineStore>,
}

impl ResearchCoordinator {
    pub fn new(service: Arc<dyn ResearchService>, store: Arc<TimelineStore>) -> Self {
        Self { service, store }
    }

    /// Start a query for one of the task's research actions.
    ///
    /// `action` selects the action by id or de-duplication key; without it
    /// the task's first research action is used. Without `query` the
    /// suggested query for the action is sent.
    pub async fn start_for_action(
        &self,
        task_id: &str,
        action: Option<&str>,
        query: Option<&str>,
    ) -> Result<ResearchState, TimelineError> {
        let snapshot = self.store.snapshot();
        let task = snapshot
            .task(task_id)
            .ok_or_else(|| TimelineError::TaskNotFound(task_id.to_string()))?;

        let research = find_research_action(&task.actions, action).ok_or_else(|| {
            TimelineError::Research(format!("Task {} has no research action", task_id))
        })?;

        let query_text = match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => q.to_string(),
            None => build_suggested_query(
                research,
                task,
                task.service_id.label(),
                &snapshot.profile,
                self.store.current_year(),
            ),
        };

        match self.service.start(task_id, &query_text).await {
            Ok(query_id) => {
                info!(task_id, query_id = %query_id, "Research query started");
                let state = ResearchState {
                    last_query_id: Some(query_id),
                    last_query: Some(query_text),
                    status: ResearchStatus::Pending,
                    updated_at: Some(Timestamp::now()),
                };
                self.store.set_research_state(task_id, state.clone())?;
                Ok(state)
            }
            Err(e) => {
                warn!(task_id, error = %e, "Research query failed to start");
                self.record_failure(task_id, Some(query_text), None)?;
                Err(e)
            }
        }
    }

    /// Fetch the latest status of the task's query once and record it.
    pub async fn poll(&self, task_id: &str) -> Result<ResearchQueryStatus, TimelineError> {
        let snapshot = self.store.snapshot();
        let task = snapshot
            .task(task_id)
            .ok_or_else(|| TimelineError::TaskNotFound(task_id.to_string()))?;
        let previous = task.research_state.clone().unwrap_or_default();
        let query_id = previous.last_query_id.clone().ok_or_else(|| {
            TimelineError::Research(format!("No research query started for {}", task_id))
        })?;

        match self.service.status(&query_id).await {
            Ok(report) => {
                let state = ResearchState {
                    status: report.status,
                    updated_at: Some(Timestamp::now()),
                    ..previous
                };
                self.store.set_research_state(task_id, state)?;
                Ok(report)
            }
            Err(e) => {
                warn!(task_id, query_id = %query_id, error = %e, "Research status poll failed");
                self.record_failure(task_id, previous.last_query, Some(query_id))?;
                Err(e)
            }
        }
    }

    fn record_failure(
        &self,
        task_id: &str,
        last_query: Option<String>,
        last_query_id: Option<String>,
    ) -> Result<(), TimelineError> {
        self.store.set_research_state(
            task_id,
            ResearchState {
                last_query_id,
                last_query,
                status: ResearchStatus::Failed,
                updated_at: Some(Timestamp::now()),
            },
        )?;
        Ok(())
    }
}

fn find_research_action<'a>(
    actions: &'a [TaskAction],
    selector: Option<&str>,
) -> Option<&'a ResearchAction> {
    actions.iter().find_map(|action| match action {
        TaskAction::Research(research) => match selector {
            Some(sel) if research.id.as_deref() != Some(sel) && action.dedup_key() != sel => None,
            _ => Some(research),
        },
        _ => None,
    })
}
