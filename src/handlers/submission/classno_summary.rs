use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::database::{Criteria, Table};
use crate::error::ApiError;
use crate::handlers::aggregate::{self, ScoreStats};
use crate::handlers::params::{self, DateRange, EndBound};
use crate::roster::Student;
use crate::routing::{Handler, RequestContext};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassnoMonthlyTrend<'a> {
    classno: i64,
    month: Option<String>,
    average_score: f64,
    count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    student: Option<&'a Student>,
}

/// GET /submission/classno-summary - report-score averages per class number
/// and month for one class, each row joined with the matching roster student.
///
/// The roster lookup and the score query run concurrently.
pub struct ClassnoSummary;

#[async_trait]
impl Handler for ClassnoSummary {
    async fn handle(&self, ctx: &mut RequestContext, state: &AppState) -> Result<(), ApiError> {
        let user = ctx.identity()?.clone();
        let class = ctx
            .query_param("class")
            .map(str::to_uppercase)
            .ok_or_else(|| ApiError::bad_request("Missing required parameter: class"))?;
        let lang = params::lang(ctx)?;
        let range = DateRange::from_query(ctx, EndBound::EndOfDay)?;

        let criteria = Criteria::new(Table::ReportScores(lang))
            .select(&["classno", "UploadTime", "total_score"])
            .eq("ownerId", user.member_id.as_str())
            .eq("YN", true)
            .eq_ignore_case("Class", class.as_str())
            .not_null("total_score")
            .since("UploadTime", range.start)
            .until("UploadTime", range.end);

        let (students, rows) = tokio::join!(state.roster.get_students(&user.email), state.store.select(&criteria));
        let students = students?;
        let rows = rows?;

        let mut groups: BTreeMap<(i64, Option<String>), ScoreStats> = BTreeMap::new();
        for row in &rows {
            let classno = aggregate::integer(row, "classno").unwrap_or(0);
            let month = aggregate::month(row, "UploadTime");
            groups
                .entry((classno, month))
                .or_default()
                .add(aggregate::number(row, "total_score"));
        }

        let by_class_and_no: HashMap<String, &Student> = students
            .iter()
            .filter_map(|s| {
                let class = s.class.as_deref()?.to_uppercase();
                Some((student_key(&class, s.classno), s))
            })
            .collect();

        let trends: Vec<ClassnoMonthlyTrend> = groups
            .into_iter()
            .map(|((classno, month), stats)| ClassnoMonthlyTrend {
                classno,
                month,
                average_score: stats.average(),
                count: stats.count,
                student: by_class_and_no.get(&student_key(&class, Some(classno))).copied(),
            })
            .collect();

        let total_essays: u64 = trends.iter().map(|t| t.count).sum();
        info!(
            "Class {} summary: {} students, {} groups, {} essays",
            class,
            students.len(),
            trends.len(),
            total_essays
        );

        let body = json!({
            "success": true,
            "data": trends,
            "summary": {
                "totalRecords": trends.len(),
                "totalEssays": total_essays,
                "overallAverage": aggregate::overall_average(trends.iter().map(|t| (t.average_score, t.count))),
                "totalStudents": students.len(),
            }
        });
        ctx.ok(&body)
    }
}

fn student_key(class: &str, classno: Option<i64>) -> String {
    match classno {
        Some(n) => format!("{}_{}", class, n),
        None => format!("{}_", class),
    }
}
