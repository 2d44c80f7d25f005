use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

use crate::database::{Criteria, Table};
use crate::error::ApiError;
use crate::handlers::aggregate::{self, ScoreStats};
use crate::handlers::params::{self, DateRange, EndBound};
use crate::routing::{Handler, RequestContext};
use crate::state::AppState;

const UNKNOWN_CLASS: &str = "UNKNOWN";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassMonthlyTrend {
    class: String,
    month: Option<String>,
    average_score: f64,
    count: u64,
}

/// GET /submission/class-summary - the caller's essay averages per class and month.
///
/// A missing score counts as 0.
pub struct ClassSummary;

#[async_trait]
impl Handler for ClassSummary {
    async fn handle(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), ApiError> {
        let user = ctx.identity()?.clone();
        let lang = params::lang(ctx)?;
        let range = DateRange::from_query(ctx, EndBound::EndOfDay)?;

        let criteria = Criteria::new(Table::Submissions(lang))
            .select(&["Class", "UploadTime", "AverageScore"])
            .eq("ownerId", user.member_id.as_str())
            .eq("YN", true)
            .since("UploadTime", range.start)
            .until("UploadTime", range.end);
        let rows = state.store.select(&criteria).await?;

        let mut groups: BTreeMap<(String, Option<String>), ScoreStats> = BTreeMap::new();
        for row in &rows {
            let class = aggregate::text(row, "Class")
                .map(|c| c.to_uppercase())
                .unwrap_or_else(|| UNKNOWN_CLASS.to_string());
            let month = aggregate::month(row, "UploadTime");
            let score = aggregate::number(row, "AverageScore").unwrap_or(0.0);
            groups.entry((class, month)).or_default().add(Some(score));
        }

        let trends: Vec<ClassMonthlyTrend> = groups
            .into_iter()
            .map(|((class, month), stats)| ClassMonthlyTrend {
                class,
                month,
                average_score: stats.average(),
                count: stats.count,
            })
            .collect();

        let total_essays: u64 = trends.iter().map(|t| t.count).sum();
        let overall = aggregate::overall_average(trends.iter().map(|t| (t.average_score, t.count)));

        ctx.ok(&json!({
            "success": true,
            "data": trends,
            "summary": {
                "totalRecords": trends.len(),
                "totalEssays": total_essays,
                "overallAverage": overall,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use crate::database::{Lang, Table};
    use crate::testing::TestContext;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_groups_by_upper_class_and_month() {
        let tc = TestContext::new();
        tc.seed(
            Table::Submissions(Lang::En),
            vec![
                json!({"id": 1, "ownerId": "s1", "YN": true, "Class": "1a", "UploadTime": "2024-01-05T10:00:00", "AverageScore": 80}),
                json!({"id": 2, "ownerId": "s1", "YN": true, "Class": "1A", "UploadTime": "2024-01-20T10:00:00", "AverageScore": null}),
                json!({"id": 3, "ownerId": "s1", "YN": true, "Class": "1A", "UploadTime": "2024-02-01T10:00:00", "AverageScore": 90}),
                json!({"id": 4, "ownerId": "s1", "YN": true, "Class": null, "UploadTime": "2024-02-01T10:00:00", "AverageScore": 50}),
                json!({"id": 5, "ownerId": "s1", "YN": false, "Class": "1A", "UploadTime": "2024-02-01T10:00:00", "AverageScore": 10}),
            ],
        )
        .await;

        let res = tc.get("/submission/class-summary", &TestContext::student()).await;
        assert_eq!(res.status, StatusCode::OK);
        let body = res.json();
        assert_eq!(
            body["data"],
            json!([
                {"class": "1A", "month": "2024-01", "averageScore": 40.0, "count": 2},
                {"class": "1A", "month": "2024-02", "averageScore": 90.0, "count": 1},
                {"class": "UNKNOWN", "month": "2024-02", "averageScore": 50.0, "count": 1},
            ])
        );
        assert_eq!(body["summary"]["totalRecords"], 3);
        assert_eq!(body["summary"]["totalEssays"], 4);
        assert_eq!(body["summary"]["overallAverage"], 55.0);
    }

    #[tokio::test]
    async fn test_empty_summary() {
        let tc = TestContext::new();
        let body = tc.get("/submission/class-summary?lang=hk", &TestContext::student()).await.json();
        assert_eq!(body["data"], json!([]));
        assert_eq!(body["summary"]["overallAverage"], 0.0);
    }
}
