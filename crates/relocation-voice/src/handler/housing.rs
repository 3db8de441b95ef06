//! Housing search tool and the listing collaborator it delegates to.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use relocation_core::events::TimelineEvent;
use relocation_core::Timestamp;

use super::{ToolContext, ToolHandler};
use crate::args::{AliasGroup, ToolArguments};
use crate::error::ToolError;

const LOCATION: AliasGroup = AliasGroup {
    canonical: "location",
    aliases: &["city", "to_city", "toCity"],
};

const MAX_PRICE: AliasGroup = AliasGroup {
    canonical: "max_price",
    aliases: &["maxPrice", "budget"],
};

const BEDROOMS: AliasGroup = AliasGroup {
    canonical: "bedrooms",
    aliases: &["beds", "num_bedrooms"],
};

/// Filters for a rental listing search.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HousingSearchQuery {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_price: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<u32>,
}

/// One ranked rental listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HousingListing {
    /// Display price, e.g. `$3,200/mo`.
    pub price: String,
    pub address: String,
    pub num_bedrooms: u32,
    pub num_bathrooms: f32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub zillow_url: String,
}

/// Rental listing backend.
#[async_trait]
pub trait HousingSearchService: Send + Sync {
    /// Ranked listings, best first.
    async fn search(&self, query: &HousingSearchQuery) -> Result<Vec<HousingListing>, ToolError>;
}

pub struct OpenHousingSearchHandler;

#[async_trait]
impl ToolHandler for OpenHousingSearchHandler {
    fn name(&self) -> &'static str {
        "open_housing_search"
    }

    fn description(&self) -> &'static str {
        "Open a housing search view with suggested filters"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "location": { "type": "string" },
                "max_price": { "type": "number" },
                "bedrooms": { "type": "number" }
            }
        })
    }

    fn aliases(&self) -> &'static [AliasGroup] {
        &[LOCATION, MAX_PRICE, BEDROOMS]
    }

    async fn execute(&self, ctx: &ToolContext, args: &ToolArguments) -> Result<Value, ToolError> {
        let location = args
            .str("location")
            .map(String::from)
            .or_else(|| ctx.store.profile().to_city);
        let max_price = args.u32("max_price");
        let bedrooms = args.u32("bedrooms");

        ctx.store.events().publish(TimelineEvent::HousingSearchRequested {
            location: location.clone(),
            max_price,
            bedrooms,
            timestamp: Timestamp::now(),
        });
        ctx.notify("Opening housing search results");

        let (Some(service), Some(location)) = (ctx.housing.as_ref(), location.clone()) else {
            return Ok(json!({ "success": true, "url": "/housing-search", "location": location }));
        };

        let query = HousingSearchQuery {
            location,
            max_price,
            bedrooms,
        };
        let limit = Duration::from_secs(ctx.config.housing_timeout_secs);
        match tokio::time::timeout(limit, service.search(&query)).await {
            Ok(Ok(mut listings)) => {
                listings.truncate(ctx.config.max_housing_results);
                tracing::info!(location = %query.location, count = listings.len(), "Housing search finished");
                Ok(json!({
                    "success": true,
                    "url": "/housing-search",
                    "location": query.location,
                    "count": listings.len(),
                    "listings": listings,
                }))
            }
            Ok(Err(e)) => {
                tracing::warn!(location = %query.location, error = %e, "Housing search failed");
                Ok(json!({
                    "success": false,
                    "url": "/housing-search",
                    "message": e.to_string(),
                }))
            }
            Err(_) => {
                tracing::warn!(location = %query.location, "Housing search timed out");
                Ok(json!({
                    "success": false,
                    "url": "/housing-search",
                    "message": format!(
                        "Housing search timed out after {}s",
                        ctx.config.housing_timeout_secs
                    ),
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::{args, context};
    use relocation_core::ProfileUpdate;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeListings {
        queries: Mutex<Vec<HousingSearchQuery>>,
        fail: bool,
        stall: bool,
    }

    fn listing(n: u32) -> HousingListing {
        HousingListing {
            price: format!("${},000/mo", n),
            address: format!("{} Rua Augusta", n),
            num_bedrooms: 2,
            num_bathrooms: 1.0,
            description: String::new(),
            image_url: String::new(),
            zillow_url: String::new(),
        }
    }

    #[async_trait]
    impl HousingSearchService for FakeListings {
        async fn search(&self, query: &HousingSearchQuery) -> Result<Vec<HousingListing>, ToolError> {
            self.queries.lock().unwrap().push(query.clone());
            if self.stall {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if self.fail {
                return Err(ToolError::Failed("Housing search is not configured.".into()));
            }
            Ok((1..=8).map(listing).collect())
        }
    }

    #[tokio::test]
    async fn test_without_service_only_notifies() {
        let ctx = context();
        let mut rx = ctx.store.events().subscribe();
        let handler = OpenHousingSearchHandler;
        let out = handler.execute(&ctx, &args(json!({}), &handler)).await.unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["url"], "/housing-search");

        let names: Vec<&str> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| e.event_name())
            .collect();
        assert_eq!(names, vec!["housing_search_requested", "ui_message"]);
    }

    #[tokio::test]
    async fn test_location_defaults_to_destination() {
        let service = Arc::new(FakeListings::default());
        let ctx = context().with_housing(service.clone());
        ctx.store
            .set_relocation_profile(&ProfileUpdate {
                to_city: Some("Lisbon".into()),
                ..Default::default()
            })
            .unwrap();

        let handler = OpenHousingSearchHandler;
        let out = handler
            .execute(&ctx, &args(json!({"maxPrice": "3500", "beds": 2}), &handler))
            .await
            .unwrap();
        assert_eq!(out["success"], true);
        assert_eq!(out["count"], 5);
        assert_eq!(out["listings"].as_array().unwrap().len(), 5);

        let sent = service.queries.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![HousingSearchQuery {
                location: "Lisbon".into(),
                max_price: Some(3500),
                bedrooms: Some(2),
            }]
        );
    }

    #[tokio::test]
    async fn test_service_error_is_reported() {
        let ctx = context().with_housing(Arc::new(FakeListings {
            fail: true,
            ..Default::default()
        }));
        let handler = OpenHousingSearchHandler;
        let out = handler
            .execute(&ctx, &args(json!({"location": "Austin"}), &handler))
            .await
            .unwrap();
        assert_eq!(out["success"], false);
        assert_eq!(out["message"], "Housing search is not configured.");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_service_times_out() {
        let ctx = context().with_housing(Arc::new(FakeListings {
            stall: true,
            ..Default::default()
        }));
        let handler = OpenHousingSearchHandler;
        let out = handler
            .execute(&ctx, &args(json!({"city": "Austin"}), &handler))
            .await
            .unwrap();
        assert_eq!(out["success"], false);
        assert_eq!(out["message"], "Housing search timed out after 20s");
    }
}
