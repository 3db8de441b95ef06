//! Relocation profile tools.

use async_trait::async_trait;
use serde_json::{json, Value};

use relocation_core::{ProfileUpdate, RelocationProfile};

use super::{ToolContext, ToolHandler};
use crate::args::{AliasGroup, ToolArguments, FROM_CITY, MOVE_DATE, TO_CITY};
use crate::error::ToolError;

/// "X → Y" with placeholders for unknown ends.
pub(crate) fn route_label(profile: &RelocationProfile) -> String {
    format!(
        "{} → {}",
        profile.from_city.as_deref().unwrap_or("your origin city"),
        profile.to_city.as_deref().unwrap_or("your destination"),
    )
}

pub struct GetRelocationHandler;

#[async_trait]
impl ToolHandler for GetRelocationHandler {
    fn name(&self) -> &'static str {
        "get_relocation"
    }

    fn description(&self) -> &'static str {
        "Read the current relocation profile (cities and move date)"
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "additionalProperties": false, "properties": {} })
    }

    async fn execute(&self, ctx: &ToolContext, _args: &ToolArguments) -> Result<Value, ToolError> {
        let profile = ctx.store.profile();
        Ok(json!({
            "from_city": profile.from_city.as_deref().unwrap_or("Unknown origin"),
            "to_city": profile.to_city.as_deref().unwrap_or("Unknown destination"),
            "move_date": profile.move_date.as_deref().unwrap_or("TBD"),
        }))
    }
}

pub struct SetRelocationProfileHandler;

#[async_trait]
impl ToolHandler for SetRelocationProfileHandler {
    fn name(&self) -> &'static str {
        "set_relocation_profile"
    }

    fn description(&self) -> &'static str {
        "Update relocation cities and/or target move date"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "from_city": { "type": "string" },
                "to_city": { "type": "string" },
                "move_date": { "type": "string" }
            }
        })
    }

    fn aliases(&self) -> &'static [AliasGroup] {
        &[FROM_CITY, TO_CITY, MOVE_DATE]
    }

    async fn execute(&self, ctx: &ToolContext, args: &ToolArguments) -> Result<Value, ToolError> {
        let update = ProfileUpdate {
            from_city: args.str("from_city").map(String::from),
            to_city: args.str("to_city").map(String::from),
            move_date: args.str("move_date").map(String::from),
        };
        let profile = ctx.store.set_relocation_profile(&update)?;
        if !update.is_empty() {
            ctx.notify(format!("Relocation route updated: {}", route_label(&profile)));
        }
        Ok(json!({ "success": true, "profile": profile }))
    }
}
