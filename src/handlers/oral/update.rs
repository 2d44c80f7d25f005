use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, info};

use crate::database::{Row, Table};
use crate::error::ApiError;
use crate::routing::{Handler, RequestContext};
use crate::state::AppState;

/// Body sections accepted by the update endpoint and the table each targets.
const SECTIONS: [(&str, Table); 3] = [
    ("oralUsage", Table::OralUsage),
    ("oralReport", Table::OralReport),
    ("memberLookup", Table::MemberLookup),
];

#[derive(Debug, Serialize)]
struct SectionResult {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
}

/// POST /oral/update - upsert rows into `oralUsage`, `oralReport` and
/// `MemberLookup` by `ID`.
///
/// Each section succeeds or fails on its own; the response reports one
/// result per section present in the body.
pub struct Update;

#[async_trait]
impl Handler for Update {
    async fn handle(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), ApiError> {
        ctx.identity()?;
        let body = match ctx.json_body() {
            Some(Value::Object(body)) => body.clone(),
            _ => return Err(ApiError::bad_request("Request body must be a JSON object")),
        };

        let mut results = Map::new();
        for (section, table) in SECTIONS {
            let Some(data) = body.get(section).filter(|v| is_truthy(v)) else {
                continue;
            };
            let result = upsert_section(state, section, table, data).await;
            results.insert(section.to_string(), json!(result));
        }

        ctx.ok(&json!({ "success": true, "results": results }))
    }
}

async fn upsert_section(state: &AppState, section: &str, table: Table, data: &Value) -> SectionResult {
    let fields = data.as_object().cloned().unwrap_or_default();
    let id = ["ID", "id"]
        .iter()
        .filter_map(|k| fields.get(*k))
        .find(|v| is_truthy(v))
        .cloned();

    let Some(id) = id else {
        return SectionResult {
            success: false,
            message: format!("ID is required for {}", section),
            id: None,
        };
    };

    let fields: Row = fields
        .into_iter()
        .filter(|(k, _)| k != "ID" && k != "id")
        .collect();

    match state.store.upsert(table, &id, &fields).await {
        Ok(outcome) => {
            info!("{} {} row {}", outcome.as_str(), table.name(), id);
            SectionResult {
                success: true,
                message: outcome.as_str().to_string(),
                id: Some(id),
            }
        }
        Err(e) => {
            error!("Error updating {}: {}", section, e);
            SectionResult {
                success: false,
                message: e.to_string(),
                id: None,
            }
        }
    }
}

/// Null, false, 0 and "" count as absent.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use crate::database::Table;
    use crate::testing::TestContext;
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_sections_are_upserted_independently() {
        let tc = TestContext::new();
        tc.seed(Table::OralReport, vec![json!({"ID": "r1", "score": 1})]).await;

        let body = json!({
            "oralUsage": {"id": "u1", "class": "1A"},
            "oralReport": {"ID": "r1", "score": 5},
            "memberLookup": {"email": "x@s.edu"},
        });
        let res = tc.post("/oral/update", &TestContext::teacher(), &body).await;
        assert_eq!(res.status, StatusCode::OK);
        let results = &res.json()["results"];

        assert_eq!(results["oralUsage"], json!({"success": true, "message": "Created", "id": "u1"}));
        assert_eq!(results["oralReport"], json!({"success": true, "message": "Updated", "id": "r1"}));
        assert_eq!(
            results["memberLookup"],
            json!({"success": false, "message": "ID is required for memberLookup"})
        );

        let usage = tc.store.rows(Table::OralUsage).await;
        assert_eq!(usage[0]["ID"], "u1");
        assert!(usage[0].get("id").is_none());
        let report = tc.store.rows(Table::OralReport).await;
        assert_eq!(report[0]["score"], 5);
    }

    #[tokio::test]
    async fn test_bad_column_fails_only_its_section() {
        let tc = TestContext::new();
        let body = json!({
            "oralUsage": {"ID": "u1", "bad column": 1},
            "oralReport": {"ID": "r1"},
        });
        let results = tc.post("/oral/update", &TestContext::teacher(), &body).await.json()["results"].clone();
        assert_eq!(results["oralUsage"]["success"], false);
        assert_eq!(results["oralReport"]["success"], true);
        assert!(results.get("memberLookup").is_none());
    }

    #[tokio::test]
    async fn test_body_must_be_object() {
        let tc = TestContext::new();
        let res = tc.post("/oral/update", &TestContext::teacher(), &json!([1, 2])).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
    }
}
