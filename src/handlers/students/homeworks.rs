use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{empty_listing, StudentQuery};
use crate::database::{Criteria, Row, Table};
use crate::error::ApiError;
use crate::handlers::aggregate;
use crate::routing::{Handler, RequestContext};
use crate::state::AppState;

const ASSIGNMENT_COLUMNS: &[&str] = &[
    "ID", "EssayTitle", "EssayInstructions", "EssayLanguage", "TypeOfWriting",
    "Subject", "Deadline", "CreatedDate", "UpdatedDate",
];

/// GET /student-homeworks - a student's homework uploads merged with the
/// assignment each one answers.
pub struct Homeworks;

#[async_trait]
impl Handler for Homeworks {
    async fn handle(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), ApiError> {
        ctx.identity()?;
        let query = StudentQuery::from_query(ctx)?;

        let images = state.store.select(&query.homework_images()).await?;
        if images.is_empty() {
            return ctx.ok(&empty_listing());
        }

        let homework_ids: BTreeSet<String> = images
            .iter()
            .filter_map(|img| aggregate::text(img, "homeworkId"))
            .filter(|id| !id.is_empty())
            .collect();
        let assignments = assignments_by_id(state, homework_ids).await?;

        let data: Vec<Value> = images
            .into_iter()
            .map(|mut img| {
                let homework_id = img.get("homeworkId").cloned().unwrap_or(Value::Null);
                img.insert("teacherAssignmentId".to_string(), homework_id);
                if let Some(assignment) = aggregate::text(&img, "homeworkId").and_then(|id| assignments.get(&id)) {
                    for (key, value) in assignment {
                        img.insert(key.clone(), value.clone());
                    }
                }
                Value::Object(img)
            })
            .collect();

        let params = query.params(ctx);
        ctx.ok(&json!({
            "success": true,
            "total": data.len(),
            "data": data,
            "params": params,
        }))
    }
}

async fn assignments_by_id(state: &AppState, ids: BTreeSet<String>) -> Result<HashMap<String, Row>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let criteria = Criteria::new(Table::TeacherAssignment)
        .select(ASSIGNMENT_COLUMNS)
        .within("ID", ids);
    Ok(state
        .store
        .select(&criteria)
        .await?
        .into_iter()
        .filter_map(|row| aggregate::text(&row, "ID").map(|id| (id, row)))
        .collect())
}
