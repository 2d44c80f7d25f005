use async_trait::async_trait;
use serde_json::json;

use crate::error::ApiError;
use crate::routing::{Handler, RequestContext};
use crate::state::AppState;

/// GET /users/me - the caller's token claims.
pub struct Me;

#[async_trait]
impl Handler for Me {
    async fn handle(&self, ctx: &mut RequestContext, _state: &AppState) -> Result<(), ApiError> {
        let user = ctx.identity()?.clone();
        ctx.ok(&json!({ "success": true, "user": user }))
    }
}
