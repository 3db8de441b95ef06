//! Task listing and mutation tools.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use relocation_core::events::HighlightAction;
use relocation_core::{ServiceId, Task, TaskPatch, TaskStatus, Timestamp};
use relocation_timeline::resolve_service;

use super::{failure, ToolContext, ToolHandler};
use crate::args::{AliasGroup, ToolArguments, SERVICE_ID, TASK_ID, TASK_LIST};
use crate::error::ToolError;

/// Lenient status parsing for spoken values ("done", "in progress").
fn parse_status(raw: &str) -> Option<TaskStatus> {
    match raw.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
        "pending" | "todo" | "not_started" | "open" => Some(TaskStatus::Pending),
        "in_progress" | "started" | "active" => Some(TaskStatus::InProgress),
        "completed" | "complete" | "done" | "finished" => Some(TaskStatus::Completed),
        _ => None,
    }
}

/// Build a [`TaskPatch`] from agent-supplied fields.
///
/// Service phrases are resolved and statuses parsed leniently; fields that
/// cannot be interpreted are dropped rather than failing the whole patch.
fn patch_from(fields: &Map<String, Value>) -> Result<TaskPatch, ToolError> {
    let mut cleaned = fields.clone();
    cleaned.remove("id");

    let service = ["serviceId", "service_id", "service"]
        .iter()
        .find_map(|key| cleaned.remove(*key))
        .and_then(|v| v.as_str().and_then(resolve_service));
    cleaned.remove("service");
    cleaned.remove("service_id");
    if let Some(service) = service {
        cleaned.insert("serviceId".into(), json!(service));
    }

    match cleaned.remove("status") {
        Some(Value::String(raw)) => match parse_status(&raw) {
            Some(status) => {
                cleaned.insert("status".into(), json!(status));
            }
            None => tracing::debug!(status = %raw, "Ignoring unknown task status"),
        },
        Some(_) | None => {}
    }

    if let Some(Value::Number(n)) = cleaned.get("sequence") {
        if n.as_u64().is_none() {
            cleaned.remove("sequence");
        }
    }

    serde_json::from_value(Value::Object(cleaned))
        .map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Compact projection returned by `list_tasks`.
fn summary(task: &Task) -> Value {
    json!({
        "id": task.id,
        "title": task.title,
        "status": task.status,
        "serviceId": task.service_id,
        "timeframe": task.timeframe,
    })
}

// =============================================================================
// list_tasks
// =============================================================================

pub struct ListTasksHandler;

#[async_trait]
impl ToolHandler for ListTasksHandler {
    fn name(&self) -> &'static str {
        "list_tasks"
    }

    fn description(&self) -> &'static str {
        "List tasks, optionally filtered by service, status, and count"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "service": { "type": "string" },
                "status": { "type": "string", "enum": ["pending", "in_progress", "completed"] },
                "limit": { "type": "number" }
            }
        })
    }

    fn aliases(&self) -> &'static [AliasGroup] {
        &[SERVICE_ID]
    }

    async fn execute(&self, ctx: &ToolContext, args: &ToolArguments) -> Result<Value, ToolError> {
        let service = match args.str("serviceId") {
            Some(phrase) => match resolve_service(phrase) {
                Some(id) => Some(id),
                None => return Ok(failure(format!("No matching service for: {}", phrase))),
            },
            None => None,
        };
        let status = match args.str("status") {
            Some(raw) => match parse_status(raw) {
                Some(status) => Some(status),
                None => return Ok(failure(format!("Unknown task status: {}", raw))),
            },
            None => None,
        };
        let limit = args.u32("limit").map(|n| n as usize).unwrap_or(usize::MAX);

        let snapshot = ctx.store.snapshot();
        let tasks: Vec<Value> = snapshot
            .tasks
            .iter()
            .filter(|t| service.map_or(true, |s| t.service_id == s))
            .filter(|t| status.map_or(true, |s| t.status == s))
            .take(limit)
            .map(summary)
            .collect();

        Ok(json!({ "count": tasks.len(), "tasks": tasks }))
    }
}

// =============================================================================
// complete_tasks
// =============================================================================

pub struct CompleteTasksHandler;

#[async_trait]
impl ToolHandler for CompleteTasksHandler {
    fn name(&self) -> &'static str {
        "complete_tasks"
    }

    fn description(&self) -> &'static str {
        "Mark one or more tasks complete"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "ids": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["ids"]
        })
    }

    fn aliases(&self) -> &'static [AliasGroup] {
        &[TASK_LIST, TASK_ID]
    }

    async fn execute(&self, ctx: &ToolContext, args: &ToolArguments) -> Result<Value, ToolError> {
        let mut ids = args.string_list("ids");
        if let Some(single) = args.str("id") {
            ids.push(single.to_string());
        }

        let mut updated = Vec::new();
        let mut missing = Vec::new();
        for id in ids {
            if ctx.store.update_task_status(&id, TaskStatus::Completed)? {
                updated.push(id);
            } else {
                missing.push(id);
            }
        }

        if updated.is_empty() {
            return Ok(failure("Task not found."));
        }
        ctx.highlight(updated.clone(), HighlightAction::Completed);
        Ok(json!({ "success": true, "updated": updated, "missing": missing }))
    }
}

// =============================================================================
// toggle_task
// =============================================================================

pub struct ToggleTaskHandler;

#[async_trait]
impl ToolHandler for ToggleTaskHandler {
    fn name(&self) -> &'static str {
        "toggle_task"
    }

    fn description(&self) -> &'static str {
        "Toggle a task between completed and pending"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "id": { "type": "string" }
            },
            "required": ["id"]
        })
    }

    fn aliases(&self) -> &'static [AliasGroup] {
        &[TASK_ID]
    }

    async fn execute(&self, ctx: &ToolContext, args: &ToolArguments) -> Result<Value, ToolError> {
        let Some(id) = args.str("id") else {
            return Ok(failure("Task id is required."));
        };
        let Some(current) = ctx.store.snapshot().task(id).map(|t| t.status) else {
            return Ok(failure("Task not found."));
        };

        let next = match current {
            TaskStatus::Completed => TaskStatus::Pending,
            _ => TaskStatus::Completed,
        };
        ctx.store.update_task_status(id, next)?;
        ctx.highlight(vec![id.to_string()], HighlightAction::Touched);
        Ok(json!({ "success": true, "status": next }))
    }
}

// =============================================================================
// edit_task
// =============================================================================

pub struct EditTaskHandler;

#[async_trait]
impl ToolHandler for EditTaskHandler {
    fn name(&self) -> &'static str {
        "edit_task"
    }

    fn description(&self) -> &'static str {
        "Edit a single task with partial updates"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "id": { "type": "string" },
                "updates": { "type": "object", "additionalProperties": true }
            },
            "required": ["id"]
        })
    }

    fn aliases(&self) -> &'static [AliasGroup] {
        &[TASK_ID]
    }

    async fn execute(&self, ctx: &ToolContext, args: &ToolArguments) -> Result<Value, ToolError> {
        let Some(id) = args.str("id") else {
            return Ok(failure("Task id is required."));
        };

        // Some agents put the fields next to the id instead of under `updates`.
        let fields = match args.get("updates") {
            Some(Value::Object(updates)) => updates.clone(),
            _ => match args.clone().into_value() {
                Value::Object(mut top) => {
                    top.remove("updates");
                    top
                }
                _ => Map::new(),
            },
        };
        let patch = patch_from(&fields)?;

        match ctx.store.patch_task(id, &patch)? {
            Some(task) => {
                ctx.highlight(vec![task.id.clone()], HighlightAction::Updated);
                Ok(json!({ "success": true, "task": task }))
            }
            None => Ok(failure("Task not found.")),
        }
    }
}

// =============================================================================
// update_tasks
// =============================================================================

pub struct UpdateTasksHandler;

impl UpdateTasksHandler {
    /// Minimal task for an update whose id is not in the plan.
    fn synthesize(id: &str, service: ServiceId, patch: &TaskPatch, sequence: u32) -> Task {
        Task {
            id: id.to_string(),
            service_id: service,
            title: patch.title.clone().unwrap_or_else(|| "New task".to_string()),
            description: patch
                .description
                .clone()
                .unwrap_or_else(|| "Added by voice assistant".to_string()),
            timeframe: patch.timeframe.clone().unwrap_or_else(|| "TBD".to_string()),
            status: patch.status.unwrap_or_default(),
            sequence: patch.sequence.unwrap_or(sequence),
            last_updated_at: Some(Timestamp::now()),
            template_slug: None,
            extra_info: patch.extra_info.clone().unwrap_or_default(),
            actions: Vec::new(),
            rule_actions: Vec::new(),
            research_state: None,
        }
    }
}

#[async_trait]
impl ToolHandler for UpdateTasksHandler {
    fn name(&self) -> &'static str {
        "update_tasks"
    }

    fn description(&self) -> &'static str {
        "Update multiple tasks with partial fields"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "updates": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "additionalProperties": true,
                        "properties": {
                            "id": { "type": "string" },
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "timeframe": { "type": "string" },
                            "status": { "type": "string", "enum": ["pending", "in_progress", "completed"] },
                            "serviceId": { "type": "string" },
                            "sequence": { "type": "number" }
                        },
                        "required": ["id"]
                    }
                }
            }
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: &ToolArguments) -> Result<Value, ToolError> {
        let mut updates: Vec<(String, TaskPatch)> = Vec::new();
        for raw in args.objects("updates") {
            let entry = ToolArguments::canonicalize(raw, &[TASK_ID]);
            let Some(id) = entry.str("id").map(String::from) else {
                tracing::debug!("Skipping task update without id");
                continue;
            };
            let fields = match entry.into_value() {
                Value::Object(fields) => fields,
                _ => continue,
            };
            match patch_from(&fields) {
                Ok(patch) => updates.push((id, patch)),
                Err(e) => {
                    tracing::debug!(task_id = %id, error = %e, "Skipping unreadable task update");
                }
            }
        }

        // Unknown ids become new tasks only when the update names a service.
        let touched = ctx.store.apply_task_updates(&updates, |id, patch, sequence| {
            patch
                .service_id
                .map(|service| Self::synthesize(id, service, patch, sequence))
        })?;

        if !touched.is_empty() {
            ctx.highlight(touched.clone(), HighlightAction::Updated);
        }
        Ok(json!({ "success": true, "updated": touched.len(), "ids": touched }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::{args, context};
    use relocation_core::events::TimelineEvent;

    fn seeded() -> (crate::handler::ToolContext, Vec<Task>) {
        let ctx = context();
        ctx.store.add_services(&[ServiceId::Immigration]).unwrap();
        let created = ctx.store.build_service_tasks(ServiceId::Immigration).unwrap();
        ctx.store.build_service_tasks(ServiceId::Housing).unwrap();
        (ctx, created)
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("Done"), Some(TaskStatus::Completed));
        assert_eq!(parse_status("in progress"), Some(TaskStatus::InProgress));
        assert_eq!(parse_status("in-progress"), Some(TaskStatus::InProgress));
        assert_eq!(parse_status("pending"), Some(TaskStatus::Pending));
        assert_eq!(parse_status("blocked"), None);
    }

    #[test]
    fn test_patch_from_resolves_service_and_drops_bad_status() {
        let fields = json!({"id": "x", "service": "visa", "status": "blocked", "title": "Renew"});
        let patch = patch_from(fields.as_object().unwrap()).unwrap();
        assert_eq!(patch.service_id, Some(ServiceId::Immigration));
        assert_eq!(patch.status, None);
        assert_eq!(patch.title.as_deref(), Some("Renew"));
    }

    #[tokio::test]
    async fn test_list_tasks_projection_and_filters() {
        let (ctx, _) = seeded();
        let handler = ListTasksHandler;

        let all = handler.execute(&ctx, &args(json!({}), &handler)).await.unwrap();
        assert_eq!(all["count"].as_u64().unwrap() as usize, ctx.store.tasks().len());
        let first = all["tasks"][0].as_object().unwrap();
        let mut keys: Vec<&str> = first.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["id", "serviceId", "status", "timeframe", "title"]);

        let housing = handler
            .execute(&ctx, &args(json!({"service": "apartment", "limit": 2}), &handler))
            .await
            .unwrap();
        assert_eq!(housing["count"], 2);
        for task in housing["tasks"].as_array().unwrap() {
            assert_eq!(task["serviceId"], "housing");
        }

        let done = handler
            .execute(&ctx, &args(json!({"status": "completed"}), &handler))
            .await
            .unwrap();
        assert_eq!(done["count"], 0);
    }

    #[tokio::test]
    async fn test_list_tasks_unknown_filter() {
        let (ctx, _) = seeded();
        let handler = ListTasksHandler;
        let out = handler
            .execute(&ctx, &args(json!({"service": "astrology"}), &handler))
            .await
            .unwrap();
        assert_eq!(out["success"], false);
    }

    #[tokio::test]
    async fn test_complete_tasks_highlights() {
        let (ctx, created) = seeded();
        let mut rx = ctx.store.events().subscribe();
        let handler = CompleteTasksHandler;
        let id = created[0].id.clone();

        let out = handler
            .execute(&ctx, &args(json!({"task_ids": [id, "missing"]}), &handler))
            .await
            .unwrap();
        assert_eq!(out["updated"], json!([id]));
        assert_eq!(out["missing"], json!(["missing"]));
        assert_eq!(
            ctx.store.snapshot().task(&id).unwrap().status,
            TaskStatus::Completed
        );

        let mut highlighted = None;
        while let Ok(event) = rx.try_recv() {
            if let TimelineEvent::TaskHighlight { ids, action, .. } = event {
                highlighted = Some((ids, action));
            }
        }
        assert_eq!(highlighted, Some((vec![id], HighlightAction::Completed)));
    }

    #[tokio::test]
    async fn test_complete_tasks_all_unknown() {
        let (ctx, _) = seeded();
        let handler = CompleteTasksHandler;
        let before = ctx.store.tasks();
        let out = handler
            .execute(&ctx, &args(json!({"ids": ["nope"]}), &handler))
            .await
            .unwrap();
        assert_eq!(out, failure("Task not found."));
        assert_eq!(ctx.store.tasks(), before);
    }

    #[tokio::test]
    async fn test_toggle_task_flips_status() {
        let (ctx, created) = seeded();
        let handler = ToggleTaskHandler;
        let id = created[0].id.clone();

        let out = handler
            .execute(&ctx, &args(json!({"taskId": id}), &handler))
            .await
            .unwrap();
        assert_eq!(out["status"], "completed");
        let out = handler
            .execute(&ctx, &args(json!({"id": id}), &handler))
            .await
            .unwrap();
        assert_eq!(out["status"], "pending");

        let missing = handler
            .execute(&ctx, &args(json!({"id": "nope"}), &handler))
            .await
            .unwrap();
        assert_eq!(missing, failure("Task not found."));
    }

    #[tokio::test]
    async fn test_edit_task_patches_fields() {
        let (ctx, created) = seeded();
        let handler = EditTaskHandler;
        let id = created[0].id.clone();

        let out = handler
            .execute(
                &ctx,
                &args(
                    json!({"id": id, "updates": {"title": "Collect documents", "status": "in progress"}}),
                    &handler,
                ),
            )
            .await
            .unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["task"]["title"], "Collect documents");

        let task = ctx.store.snapshot().task(&id).cloned().unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.id, id);
    }

    #[tokio::test]
    async fn test_edit_task_accepts_top_level_fields() {
        let (ctx, created) = seeded();
        let handler = EditTaskHandler;
        let id = created[0].id.clone();
        handler
            .execute(&ctx, &args(json!({"id": id, "timeframe": "Week 3"}), &handler))
            .await
            .unwrap();
        assert_eq!(ctx.store.snapshot().task(&id).unwrap().timeframe, "Week 3");
    }

    #[tokio::test]
    async fn test_edit_unknown_task() {
        let (ctx, _) = seeded();
        let handler = EditTaskHandler;
        let out = handler
            .execute(&ctx, &args(json!({"id": "nope", "updates": {"title": "x"}}), &handler))
            .await
            .unwrap();
        assert_eq!(out, failure("Task not found."));
    }

    #[tokio::test]
    async fn test_update_tasks_patches_and_synthesizes() {
        let (ctx, created) = seeded();
        let before = ctx.store.tasks().len();
        let handler = UpdateTasksHandler;
        let existing = created[1].id.clone();

        let out = handler
            .execute(
                &ctx,
                &args(
                    json!({"updates": [
                        {"id": existing, "status": "completed"},
                        {"id": "task-custom-1", "serviceId": "visa", "title": "Translate diplomas"},
                        {"id": "task-custom-2", "title": "No service given"},
                        {"title": "No id"}
                    ]}),
                    &handler,
                ),
            )
            .await
            .unwrap();
        assert_eq!(out["updated"], 2);

        let snapshot = ctx.store.snapshot();
        assert_eq!(snapshot.tasks.len(), before + 1);
        assert_eq!(snapshot.task(&existing).unwrap().status, TaskStatus::Completed);

        let synthesized = snapshot.task("task-custom-1").unwrap();
        assert_eq!(synthesized.service_id, ServiceId::Immigration);
        assert_eq!(synthesized.title, "Translate diplomas");
        assert_eq!(synthesized.description, "Added by voice assistant");
        assert_eq!(synthesized.timeframe, "TBD");
        assert_eq!(synthesized.status, TaskStatus::Pending);
        assert_eq!(synthesized.sequence, before as u32 + 2);
        assert!(snapshot.task("task-custom-2").is_none());
    }

    #[tokio::test]
    async fn test_update_tasks_without_updates_is_noop() {
        let (ctx, _) = seeded();
        let before = ctx.store.tasks();
        let handler = UpdateTasksHandler;
        let out = handler.execute(&ctx, &args(json!({}), &handler)).await.unwrap();
        assert_eq!(out["updated"], 0);
        assert_eq!(ctx.store.tasks(), before);
    }
}
