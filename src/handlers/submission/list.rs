use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::database::{Criteria, SortDirection, Table};
use crate::error::ApiError;
use crate::handlers::params::{self, DateRange, EndBound, Pagination, INVALID_PAGINATION};
use crate::routing::{Handler, RequestContext};
use crate::state::AppState;

/// GET /submission/list - the caller's submitted essays, newest first.
///
/// Query: `page`, `pageSize`, `lang`, `class`, `startDate`, `endDate`.
pub struct List;

#[async_trait]
impl Handler for List {
    async fn handle(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), ApiError> {
        let user = ctx.identity()?.clone();
        let pagination = Pagination::from_query(ctx, INVALID_PAGINATION)?;
        let lang = params::lang(ctx)?;
        let range = DateRange::from_query(ctx, EndBound::EndOfDay)?;

        let criteria = Criteria::new(Table::Submissions(lang))
            .eq("ownerId", user.member_id.as_str())
            .eq("YN", true)
            .eq_opt("Class", ctx.query_param("class"))
            .since("UploadTime", range.start)
            .until("UploadTime", range.end);
        debug!("Submission list for {}: {:?}", user.member_id, criteria.conditions);

        let page = criteria
            .clone()
            .order_by("id", SortDirection::Desc)
            .page(pagination.page, pagination.page_size);
        let (rows, total) = tokio::try_join!(state.store.select(&page), state.store.count(&criteria))?;

        ctx.ok(&json!({
            "success": true,
            "data": rows,
            "pagination": pagination.summary(total),
        }))
    }
}
