//! Service selection tools.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{json, Value};

use relocation_core::events::HighlightAction;
use relocation_core::ServiceId;
use relocation_timeline::{resolve_service, resolve_services};

use super::{failure, join_ids, ToolContext, ToolHandler};
use crate::args::{AliasGroup, ToolArguments, SERVICE_ID, SERVICE_LIST};
use crate::error::ToolError;

/// Every service phrase in `args`, from the list field and the single field.
fn service_phrases(args: &ToolArguments) -> Vec<String> {
    let mut phrases = args.string_list("services");
    if let Some(single) = args.str("serviceId") {
        phrases.push(single.to_string());
    }
    phrases
}

/// Build the missing template tasks of `service` and announce them.
fn build_and_announce(
    ctx: &ToolContext,
    service: ServiceId,
    verb: &str,
) -> Result<usize, ToolError> {
    let created = ctx.store.build_service_tasks(service)?;
    if !created.is_empty() {
        ctx.highlight(
            created.iter().map(|t| t.id.clone()).collect(),
            HighlightAction::Created,
        );
        ctx.notify(format!("{} {} tasks for {}", verb, created.len(), service));
    }
    Ok(created.len())
}

// =============================================================================
// navigate_view
// =============================================================================

pub struct NavigateViewHandler;

#[async_trait]
impl ToolHandler for NavigateViewHandler {
    fn name(&self) -> &'static str {
        "navigate_view"
    }

    fn description(&self) -> &'static str {
        "Switch between timeline and dashboard views"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "view": { "type": "string", "enum": ["timeline", "dashboard"] }
            },
            "required": ["view"]
        })
    }

    async fn execute(&self, ctx: &ToolContext, args: &ToolArguments) -> Result<Value, ToolError> {
        let view = match args.str("view") {
            Some(v) if v.eq_ignore_ascii_case("dashboard") => "dashboard",
            _ => "timeline",
        };
        ctx.notify(format!("Switched to {} view", view));
        Ok(json!({ "success": true, "view": view }))
    }
}

// =============================================================================
// list_selected_services
// =============================================================================

pub struct ListSelectedServicesHandler;

#[async_trait]
impl ToolHandler for ListSelectedServicesHandler {
    fn name(&self) -> &'static str {
        "list_selected_services"
    }

    fn description(&self) -> &'static str {
        "List currently active services in the timeline"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "additionalProperties": false, "properties": {} })
    }

    async fn execute(&self, ctx: &ToolContext, _args: &ToolArguments) -> Result<Value, ToolError> {
        Ok(json!({ "services": ctx.store.selected_services() }))
    }
}

// =============================================================================
// select_services
// =============================================================================

pub struct SelectServicesHandler;

#[async_trait]
impl ToolHandler for SelectServicesHandler {
    fn name(&self) -> &'static str {
        "select_services"
    }

    fn description(&self) -> &'static str {
        "Enable one or more services for the user timeline"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "services": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["services"]
        })
    }

    fn aliases(&self) -> &'static [AliasGroup] {
        &[SERVICE_LIST, SERVICE_ID]
    }

    async fn execute(&self, ctx: &ToolContext, args: &ToolArguments) -> Result<Value, ToolError> {
        let phrases = service_phrases(args);
        let resolved: Vec<ServiceId> = resolve_services(&phrases).into_iter().collect();
        if resolved.is_empty() {
            tracing::info!(phrases = ?phrases, "No service matched selection request");
            return Ok(failure("No matching services found."));
        }

        let merged = ctx.store.add_services(&resolved)?;

        let mut created = BTreeMap::new();
        for service in &resolved {
            let count = build_and_announce(ctx, *service, "Built")?;
            created.insert(service.as_str(), count);
        }

        ctx.notify(format!("Selected services: {}", join_ids(&merged)));
        Ok(json!({ "success": true, "services": merged, "created": created }))
    }
}

// =============================================================================
// add_service_tasks
// =============================================================================

pub struct AddServiceTasksHandler;

#[async_trait]
impl ToolHandler for AddServiceTasksHandler {
    fn name(&self) -> &'static str {
        "add_service_tasks"
    }

    fn description(&self) -> &'static str {
        "Generate tasks for a specific service"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "serviceId": { "type": "string" }
            },
            "required": ["serviceId"]
        })
    }

    fn aliases(&self) -> &'static [AliasGroup] {
        &[SERVICE_ID]
    }

    async fn execute(&self, ctx: &ToolContext, args: &ToolArguments) -> Result<Value, ToolError> {
        let Some(service) = args.str("serviceId").and_then(resolve_service) else {
            return Ok(failure("Unknown service."));
        };
        let created = build_and_announce(ctx, service, "Added")?;
        Ok(json!({ "success": true, "serviceId": service, "created": created }))
    }
}

// =============================================================================
// unselect_services
// =============================================================================

pub struct UnselectServicesHandler;

#[async_trait]
impl ToolHandler for UnselectServicesHandler {
    fn name(&self) -> &'static str {
        "unselect_services"
    }

    fn description(&self) -> &'static str {
        "Disable one or more services"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "services": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["services"]
        })
    }

    fn aliases(&self) -> &'static [AliasGroup] {
        &[SERVICE_LIST, SERVICE_ID]
    }

    async fn execute(&self, ctx: &ToolContext, args: &ToolArguments) -> Result<Value, ToolError> {
        let resolved: Vec<ServiceId> = resolve_services(&service_phrases(args))
            .into_iter()
            .collect();
        if resolved.is_empty() {
            return Ok(failure("No matching services to unselect."));
        }

        let remaining = ctx.store.remove_services(&resolved)?;
        ctx.notify(format!("Active services: {}", join_ids(&remaining)));
        Ok(json!({ "success": true, "services": remaining }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::{args, context};
    use relocation_core::events::TimelineEvent;

    #[tokio::test]
    async fn test_navigate_view_defaults_to_timeline() {
        let ctx = context();
        let handler = NavigateViewHandler;
        let out = handler
            .execute(&ctx, &args(json!({"view": "Dashboard"}), &handler))
            .await
            .unwrap();
        assert_eq!(out, json!({"success": true, "view": "dashboard"}));

        let out = handler
            .execute(&ctx, &args(json!({"view": "calendar"}), &handler))
            .await
            .unwrap();
        assert_eq!(out["view"], "timeline");
    }

    #[tokio::test]
    async fn test_select_services_resolves_and_builds() {
        let ctx = context();
        let mut rx = ctx.store.events().subscribe();
        let handler = SelectServicesHandler;

        let out = handler
            .execute(&ctx, &args(json!({"services": ["visa", "apartment"]}), &handler))
            .await
            .unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["services"], json!(["housing", "immigration"]));
        assert!(out["created"]["immigration"].as_u64().unwrap() > 0);
        assert!(out["created"]["housing"].as_u64().unwrap() > 0);

        let mut messages = Vec::new();
        let mut highlights = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                TimelineEvent::UiMessage { message, .. } => messages.push(message),
                TimelineEvent::TaskHighlight { action, .. } => {
                    assert_eq!(action, HighlightAction::Created);
                    highlights += 1;
                }
                _ => {}
            }
        }
        assert_eq!(highlights, 2);
        assert_eq!(
            messages.last().map(String::as_str),
            Some("Selected services: housing, immigration")
        );
    }

    #[tokio::test]
    async fn test_select_services_is_idempotent() {
        let ctx = context();
        let handler = SelectServicesHandler;
        let call = args(json!({"services": ["moving"]}), &handler);
        handler.execute(&ctx, &call).await.unwrap();
        let count = ctx.store.tasks().len();

        let out = handler.execute(&ctx, &call).await.unwrap();
        assert_eq!(out["created"]["moving"], 0);
        assert_eq!(ctx.store.tasks().len(), count);
    }

    #[tokio::test]
    async fn test_select_services_accepts_single_alias() {
        let ctx = context();
        let handler = SelectServicesHandler;
        let out = handler
            .execute(&ctx, &args(json!({"service": "banking"}), &handler))
            .await
            .unwrap();
        assert_eq!(out["services"], json!(["finances"]));
    }

    #[tokio::test]
    async fn test_select_services_without_match_fails() {
        let ctx = context();
        let handler = SelectServicesHandler;
        let out = handler
            .execute(&ctx, &args(json!({"services": ["pet grooming"]}), &handler))
            .await
            .unwrap();
        assert_eq!(out, failure("No matching services found."));
        assert!(ctx.store.selected_services().is_empty());

        let out = handler.execute(&ctx, &args(json!({}), &handler)).await.unwrap();
        assert_eq!(out["success"], false);
    }

    #[tokio::test]
    async fn test_add_service_tasks() {
        let ctx = context();
        let handler = AddServiceTasksHandler;
        let out = handler
            .execute(&ctx, &args(json!({"service_id": "schools"}), &handler))
            .await
            .unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["serviceId"], "settling");
        assert!(out["created"].as_u64().unwrap() > 0);

        let again = handler
            .execute(&ctx, &args(json!({"serviceId": "settling"}), &handler))
            .await
            .unwrap();
        assert_eq!(again["created"], 0);
    }

    #[tokio::test]
    async fn test_add_service_tasks_unknown_service() {
        let ctx = context();
        let handler = AddServiceTasksHandler;
        let out = handler
            .execute(&ctx, &args(json!({"serviceId": "astrology"}), &handler))
            .await
            .unwrap();
        assert_eq!(out, failure("Unknown service."));
        assert!(ctx.store.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_unselect_never_empties_selection() {
        let ctx = context();
        ctx.store
            .add_services(&[ServiceId::Housing, ServiceId::Immigration])
            .unwrap();
        let handler = UnselectServicesHandler;

        let out = handler
            .execute(&ctx, &args(json!({"services": ["housing", "immigration"]}), &handler))
            .await
            .unwrap();
        assert_eq!(out["services"], json!(["housing", "immigration"]));

        let out = handler
            .execute(&ctx, &args(json!({"services": ["rental"]}), &handler))
            .await
            .unwrap();
        assert_eq!(out["services"], json!(["immigration"]));
    }

    #[tokio::test]
    async fn test_unselect_without_match_fails() {
        let ctx = context();
        let handler = UnselectServicesHandler;
        let out = handler
            .execute(&ctx, &args(json!({"services": []}), &handler))
            .await
            .unwrap();
        assert_eq!(out, failure("No matching services to unselect."));
    }

    #[tokio::test]
    async fn test_list_selected_services() {
        let ctx = context();
        ctx.store.add_services(&[ServiceId::Moving]).unwrap();
        let handler = ListSelectedServicesHandler;
        let out = handler.execute(&ctx, &ToolArguments::default()).await.unwrap();
        assert_eq!(out, json!({"services": ["moving"]}));
    }
}
