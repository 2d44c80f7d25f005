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

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct GroupKey {
    class: Option<String>,
    month: Option<String>,
    classno: Option<i64>,
    member_id: Option<String>,
    full_name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentSummary {
    class: Option<String>,
    month: Option<String>,
    classno: Option<i64>,
    member_id: Option<String>,
    full_name: Option<String>,
    email: Option<String>,
    count: u64,
    average_score: f64,
}

/// GET /oral/classno-summary - oral stats per class, month and student.
///
/// `class` narrows to one of the caller's classes; any other class is 403.
pub struct ClassnoSummary;

#[async_trait]
impl Handler for ClassnoSummary {
    async fn handle(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), ApiError> {
        let user = ctx.identity()?.clone();
        let classes = caller_classes(&user)?;
        let target = match ctx.query_param("class") {
            Some(class) if user.classes.contains(class) => vec![class.to_string()],
            Some(_) => return Err(ApiError::forbidden("Access denied to the specified class")),
            None => classes,
        };
        let range = DateRange::from_query(ctx, EndBound::Exact)?;

        let school = Some(user.school.as_str()).filter(|s| !s.is_empty());
        let criteria = Criteria::new(Table::OralUsage)
            .select(&["class", "createDate", "classno", "memberId", "fullName", "email", "overallTotalScore"])
            .eq_opt("school", school)
            .within("class", target)
            .eq_opt("language", ctx.query_param("language"))
            .since("createDate", range.start)
            .until("createDate", range.end);
        let rows = state.store.select(&criteria).await?;

        let mut groups: BTreeMap<GroupKey, ScoreStats> = BTreeMap::new();
        for row in &rows {
            let key = GroupKey {
                class: aggregate::text(row, "class"),
                month: aggregate::month(row, "createDate"),
                classno: aggregate::integer(row, "classno"),
                member_id: aggregate::text(row, "memberId"),
                full_name: aggregate::text(row, "fullName"),
                email: aggregate::text(row, "email"),
            };
            groups
                .entry(key)
                .or_default()
                .add(aggregate::number(row, "overallTotalScore"));
        }

        let summary: Vec<StudentSummary> = groups
            .into_iter()
            .map(|(key, stats)| StudentSummary {
                class: key.class,
                month: key.month,
                classno: key.classno,
                member_id: key.member_id,
                full_name: key.full_name,
                email: key.email,
                count: stats.count,
                average_score: stats.average(),
            })
            .collect();

        ctx.ok(&json!({ "success": true, "data": summary }))
    }
}

#[cfg(test)]
mod tests {
    use crate::database::Table;
    use crate::testing::TestContext;
    use axum::http::StatusCode;
    use serde_json::json;

    async fn seeded() -> TestContext {
        let tc = TestContext::new();
        tc.seed(
            Table::OralUsage,
            vec![
                json!({"ID": "1", "school": "S", "class": "1A", "classno": 2, "memberId": "s2", "fullName": "Bo", "email": "s2@s.edu", "createDate": "2024-01-10T00:00:00", "overallTotalScore": 70}),
                json!({"ID": "2", "school": "S", "class": "1A", "classno": 1, "memberId": "s1", "fullName": "Al", "email": "s1@s.edu", "createDate": "2024-01-11T00:00:00", "overallTotalScore": 80}),
                json!({"ID": "3", "school": "S", "class": "1A", "classno": 1, "memberId": "s1", "fullName": "Al", "email": "s1@s.edu", "createDate": "2024-01-12T00:00:00", "overallTotalScore": 60}),
                json!({"ID": "4", "school": "S", "class": "1B", "classno": 1, "memberId": "s3", "fullName": "Cy", "email": "s3@s.edu", "createDate": "2024-01-12T00:00:00", "overallTotalScore": 90}),
            ],
        )
        .await;
        tc
    }

    #[tokio::test]
    async fn test_groups_per_student() {
        let tc = seeded().await;
        let res = tc.get("/oral/classno-summary?class=1A", &TestContext::teacher()).await;
        assert_eq!(res.status, StatusCode::OK);
        let body = res.json();
        assert_eq!(
            body["data"],
            json!([
                {"class": "1A", "month": "2024-01", "classno": 1, "memberId": "s1", "fullName": "Al", "email": "s1@s.edu", "count": 2, "averageScore": 70.0},
                {"class": "1A", "month": "2024-01", "classno": 2, "memberId": "s2", "fullName": "Bo", "email": "s2@s.edu", "count": 1, "averageScore": 70.0},
            ])
        );

        let body = tc.get("/oral/classno-summary", &TestContext::teacher()).await.json();
        assert_eq!(body["data"].as_array().map(Vec::len), Some(3));
    }

    #[tokio::test]
    async fn test_foreign_class_is_forbidden() {
        let tc = seeded().await;
        let res = tc.get("/oral/classno-summary?class=9Z", &TestContext::teacher()).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);
        assert_eq!(res.json()["error"], "Access denied to the specified class");
    }
}
