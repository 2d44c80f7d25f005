use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};

use super::{empty_listing, StudentQuery};
use crate::database::{Criteria, Lang, Row, Table};
use crate::error::ApiError;
use crate::handlers::aggregate;
use crate::routing::{Handler, RequestContext};
use crate::state::AppState;

/// Corrected text for one upload in one language; every field is null when
/// the upload has no corrected copy in that language.
#[derive(Debug, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct EssayContent {
    original_text: Option<String>,
    revised_text: Option<String>,
    comments: Option<String>,
    title: Option<String>,
    pdf_url: Option<String>,
    score: Option<f64>,
}

impl EssayContent {
    fn from_row(row: Option<&Row>, lang: Lang) -> Self {
        let Some(row) = row else {
            return Self::default();
        };
        Self {
            original_text: aggregate::text(row, "original_text"),
            revised_text: aggregate::text(row, "revised_text"),
            comments: aggregate::text(row, comments_column(lang)),
            title: aggregate::text(row, "title"),
            pdf_url: aggregate::text(row, "pdf_url"),
            score: aggregate::number(row, "score2"),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EssayData {
    homework_images_id: Value,
    student_homework_id: Value,
    homework_id: Value,
    created_at: Value,
    attempt: Value,
    essay_language: Value,
    image_url: Option<String>,
    en: EssayContent,
    cn: EssayContent,
}

/// The English table keeps its feedback as `relevancy_comment`.
fn comments_column(lang: Lang) -> &'static str {
    match lang {
        Lang::En => "relevancy_comment",
        Lang::Hk => "comments",
    }
}

/// First entry of the comma separated `image_array`.
fn first_image(row: &Row) -> Option<String> {
    aggregate::text(row, "image_array")?
        .split(',')
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// GET /student/essays - a student's uploads with the English and Chinese
/// corrections side by side.
pub struct Essays;

#[async_trait]
impl Handler for Essays {
    async fn handle(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), ApiError> {
        ctx.identity()?;
        let query = StudentQuery::from_query(ctx)?;

        let uploads = state.store.select(&query.homework_images()).await?;
        if uploads.is_empty() {
            return ctx.ok(&empty_listing());
        }

        let ids: Vec<Value> = uploads.iter().filter_map(|u| u.get("id").cloned()).collect();
        let (en, cn) = tokio::try_join!(
            details_by_upload(state, Lang::En, &ids),
            details_by_upload(state, Lang::Hk, &ids),
        )?;

        let data: Vec<EssayData> = uploads
            .iter()
            .map(|upload| {
                let key = aggregate::text(upload, "id");
                let field = |name: &str| upload.get(name).cloned().unwrap_or(Value::Null);
                EssayData {
                    homework_images_id: field("id"),
                    student_homework_id: field("studentHomeworkId"),
                    homework_id: field("homeworkId"),
                    created_at: field("createdAt"),
                    attempt: field("attempt"),
                    essay_language: field("eaasy_language"),
                    image_url: first_image(upload),
                    en: EssayContent::from_row(key.as_ref().and_then(|k| en.get(k)), Lang::En),
                    cn: EssayContent::from_row(key.as_ref().and_then(|k| cn.get(k)), Lang::Hk),
                }
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

/// Corrections for the given uploads keyed by upload id.
async fn details_by_upload(state: &AppState, lang: Lang, ids: &[Value]) -> Result<HashMap<String, Row>, ApiError> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let criteria = Criteria::new(Table::EssayDetails(lang))
        .select(&[
            "id", "homeworkimages_id", "original_text", "revised_text",
            comments_column(lang), "title", "pdf_url", "score2",
        ])
        .within("homeworkimages_id", ids.iter().cloned());
    Ok(state
        .store
        .select(&criteria)
        .await?
        .into_iter()
        .filter_map(|row| aggregate::text(&row, "homeworkimages_id").map(|id| (id, row)))
        .collect())
}
