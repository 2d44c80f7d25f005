use async_trait::async_trait;
use serde_json::json;

use crate::database::{Criteria, SortDirection, Table};
use crate::error::ApiError;
use crate::handlers::params::{DateRange, EndBound, Pagination, INVALID_PAGINATION};
use crate::routing::{Handler, RequestContext};
use crate::state::AppState;

/// GET /oral/list - oral practice records for one question or one member.
///
/// `oralQuestionId` takes precedence over `memberId`; one of them is required.
pub struct List;

#[async_trait]
impl Handler for List {
    async fn handle(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), ApiError> {
        ctx.identity()?;

        let criteria = match (ctx.query_param("oralQuestionId"), ctx.query_param("memberId")) {
            (Some(question), _) => Criteria::new(Table::OralUsage).eq("OralQuestionId", question),
            (None, Some(member)) => Criteria::new(Table::OralUsage).eq("memberId", member),
            (None, None) => {
                return Err(ApiError::bad_request(
                    "At least one of oralQuestionId or memberId must be provided",
                ))
            }
        };
        let pagination = Pagination::from_query(ctx, INVALID_PAGINATION)?;
        let range = DateRange::from_query(ctx, EndBound::Exact)?;

        let criteria = criteria
            .eq_opt("mode", ctx.query_param("mode"))
            .eq_opt("class", ctx.query_param("class"))
            .eq_opt("language", ctx.query_param("language"))
            .since("createDate", range.start)
            .until("createDate", range.end);

        let total = state.store.count(&criteria).await?;
        let rows = state
            .store
            .select(
                &criteria
                    .order_by("createDate", SortDirection::Desc)
                    .page(pagination.page, pagination.page_size),
            )
            .await?;

        ctx.ok(&json!({
            "success": true,
            "data": rows,
            "total": total,
            "page": pagination.page,
            "pageSize": pagination.page_size,
            "totalPages": pagination.total_pages(total),
        }))
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
                json!({"ID": "1", "OralQuestionId": "q1", "memberId": "s1", "mode": "practice", "class": "1A", "language": "en", "createDate": "2024-01-01T10:00:00"}),
                json!({"ID": "2", "OralQuestionId": "q1", "memberId": "s2", "mode": "exam", "class": "1A", "language": "en", "createDate": "2024-01-03T10:00:00"}),
                json!({"ID": "3", "OralQuestionId": "q2", "memberId": "s1", "mode": "practice", "class": "1A", "language": "zh", "createDate": "2024-01-02T10:00:00"}),
            ],
        )
        .await;
        tc
    }

    #[tokio::test]
    async fn test_requires_question_or_member() {
        let tc = seeded().await;
        let res = tc.get("/oral/list", &TestContext::student()).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert_eq!(res.json()["error"], "At least one of oralQuestionId or memberId must be provided");
    }

    #[tokio::test]
    async fn test_by_question_newest_first() {
        let tc = seeded().await;
        let body = tc.get("/oral/list?oralQuestionId=q1", &TestContext::student()).await.json();
        assert_eq!(body["total"], 2);
        assert_eq!(body["data"][0]["ID"], "2");
        assert_eq!(body["data"][1]["ID"], "1");
        assert_eq!(body["totalPages"], 1);
    }

    #[tokio::test]
    async fn test_question_wins_over_member_and_filters_apply() {
        let tc = seeded().await;
        let body = tc
            .get("/oral/list?oralQuestionId=q1&memberId=s1&mode=exam", &TestContext::student())
            .await
            .json();
        assert_eq!(body["total"], 1);
        assert_eq!(body["data"][0]["memberId"], "s2");

        let body = tc
            .get("/oral/list?memberId=s1&language=zh&pageSize=1", &TestContext::student())
            .await
            .json();
        assert_eq!(body["total"], 1);
        assert_eq!(body["pageSize"], 1);
        assert_eq!(body["data"][0]["ID"], "3");
    }

    #[tokio::test]
    async fn test_students_oral_alias() {
        let tc = seeded().await;
        let body = tc.get("/students/oral?memberId=s2", &TestContext::student()).await.json();
        assert_eq!(body["total"], 1);
    }
}
