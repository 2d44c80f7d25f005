use async_trait::async_trait;
use serde_json::json;

use crate::error::ApiError;
use crate::routing::{Handler, RequestContext};
use crate::state::AppState;

/// GET /users/students - the calling teacher's roster, served through the cache.
pub struct Students;

#[async_trait]
impl Handler for Students {
    async fn handle(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), ApiError> {
        let user = ctx.identity()?;
        if !user.is_teacher() {
            return Err(ApiError::forbidden("Forbidden: Only teachers can access this resource"));
        }
        let email = user.email.clone();

        let students = state.roster.get_students(&email).await?;
        ctx.ok(&json!({ "success": true, "data": &*students }))
    }
}
