use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::error;

use crate::database::{Criteria, SortDirection, Table};
use crate::error::ApiError;
use crate::handlers::aggregate::{self, ScoreStats};
use crate::handlers::params::{DateRange, EndBound, Pagination};
use crate::routing::{Handler, RequestContext};
use crate::state::AppState;

/// Assignment types that are never oral homework unless asked for explicitly.
const EXCLUDED_TYPES: [i64; 2] = [6, 7];

const ASSIGNMENT_COLUMNS: &[&str] = &[
    "ID", "oralQuestionID", "display_text", "photo", "description", "Deadline",
    "CreatedDate", "UpdatedDate", "Subject", "Language", "type", "Class",
];

/// GET /oral/homeworks - oral assignments owned by the caller, each with the
/// average score and submission count recorded for its question.
pub struct Homeworks;

#[async_trait]
impl Handler for Homeworks {
    async fn handle(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), ApiError> {
        let user = ctx.identity()?.clone();
        let pagination = Pagination::from_query(ctx, "Invalid pagination parameters")?;
        let range = DateRange::from_query(ctx, EndBound::Exact)?;

        let criteria = Criteria::new(Table::TeacherAssignment)
            .select(ASSIGNMENT_COLUMNS)
            .eq("Owner", user.member_id.as_str())
            .not_null("oralQuestionID");
        let criteria = match ctx.query_param("type") {
            Some(raw) => {
                let kind: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ApiError::bad_request("Invalid type parameter"))?;
                criteria.eq("type", kind)
            }
            None => criteria.not_within("type", EXCLUDED_TYPES),
        };
        let criteria = criteria
            .eq_opt("Language", ctx.query_param("language"))
            .eq_opt("Class", ctx.query_param("class"))
            .since("CreatedDate", range.start)
            .until("CreatedDate", range.end);

        let total = state.store.count(&criteria).await?;
        let assignments = state
            .store
            .select(
                &criteria
                    .order_by("CreatedDate", SortDirection::Desc)
                    .page(pagination.page, pagination.page_size),
            )
            .await?;

        let question_ids: Vec<String> = assignments
            .iter()
            .filter_map(|a| aggregate::text(a, "oralQuestionID"))
            .collect();
        let stats = question_stats(state, &question_ids).await;

        let data: Vec<Value> = assignments
            .into_iter()
            .map(|mut assignment| {
                let entry = aggregate::text(&assignment, "oralQuestionID")
                    .and_then(|id| stats.get(&id).copied())
                    .unwrap_or_default();
                assignment.insert("averageScore".to_string(), json!(entry.average()));
                assignment.insert("submissionCount".to_string(), json!(entry.count));
                Value::Object(assignment)
            })
            .collect();

        ctx.ok(&json!({
            "success": true,
            "data": data,
            "total": total,
            "page": pagination.page,
            "pageSize": pagination.page_size,
            "totalPages": pagination.total_pages(total),
        }))
    }
}

/// Per-question score stats from `oralUsage`. A failed lookup leaves every
/// question at zero rather than failing the listing.
async fn question_stats(state: &AppState, question_ids: &[String]) -> HashMap<String, ScoreStats> {
    let mut stats = HashMap::new();
    if question_ids.is_empty() {
        return stats;
    }

    let criteria = Criteria::new(Table::OralUsage)
        .select(&["OralQuestionId", "overallTotalScore"])
        .within("OralQuestionId", question_ids.iter().cloned());
    match state.store.select(&criteria).await {
        Ok(rows) => {
            for row in &rows {
                if let Some(id) = aggregate::text(row, "OralQuestionId") {
                    stats
                        .entry(id)
                        .or_insert_with(ScoreStats::default)
                        .add(aggregate::number(row, "overallTotalScore"));
                }
            }
        }
        Err(e) => error!("Failed to load oral question stats: {}", e),
    }
    stats
}
