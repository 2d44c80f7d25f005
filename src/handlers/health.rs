use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tracing::warn;

use crate::error::ApiError;
use crate::routing::{Handler, RequestContext};
use crate::state::AppState;

/// GET /health - liveness. Needs no token and always answers 200; the
/// store probe is reported in `database` only.
pub struct Health;

#[async_trait]
impl Handler for Health {
    async fn handle(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), ApiError> {
        let database = match state.store.health_check().await {
            Ok(()) => "ok",
            Err(e) => {
                warn!("Health check failed: {}", e);
                "unavailable"
            }
        };

        ctx.ok(&json!({
            "status": "ok",
            "version": state.config.api.version,
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "database": database
        }))
    }
}
