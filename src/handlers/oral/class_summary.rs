use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use super::caller_classes;
use crate::database::{Criteria, Table};
use crate::error::ApiError;
use crate::handlers::aggregate::{self, ScoreStats};
use crate::handlers::params::{DateRange, EndBound};
use crate::routing::{Handler, RequestContext};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OralTrend {
    class: Option<String>,
    month: Option<String>,
    count: u64,
    average_score: f64,
}

/// GET /oral/class-summary - oral score trend per class and month across the
/// caller's school and classes.
pub struct ClassSummary;

#[async_trait]
impl Handler for ClassSummary {
    async fn handle(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), ApiError> {
        let user = ctx.identity()?.clone();
        let classes = caller_classes(&user)?;
        let range = DateRange::from_query(ctx, EndBound::Exact)?;

        let school = Some(user.school.as_str()).filter(|s| !s.is_empty());
        let criteria = Criteria::new(Table::OralUsage)
            .select(&["class", "createDate", "overallTotalScore"])
            .eq_opt("school", school)
            .within("class", classes)
            .eq_opt("language", ctx.query_param("language"))
            .since("createDate", range.start)
            .until("createDate", range.end);
        let rows = state.store.select(&criteria).await?;

        // keyed month first so iteration follows month, class order
        let mut groups: BTreeMap<(Option<String>, Option<String>), ScoreStats> = BTreeMap::new();
        for row in &rows {
            let key = (aggregate::month(row, "createDate"), aggregate::text(row, "class"));
            groups
                .entry(key)
                .or_default()
                .add(aggregate::number(row, "overallTotalScore"));
        }

        let trends: Vec<OralTrend> = groups
            .into_iter()
            .map(|((month, class), stats)| OralTrend {
                class,
                month,
                count: stats.count,
                average_score: stats.average(),
            })
            .collect();

        ctx.ok(&json!({ "success": true, "data": trends }))
    }
}
