mod essays;
mod homeworks;

pub use essays::Essays;
pub use homeworks::Homeworks;

use serde_json::json;

use crate::database::{Criteria, SortDirection, Table};
use crate::error::ApiError;
use crate::handlers::params::{DateRange, EndBound};
use crate::routing::RequestContext;

/// `studentId` plus optional dates, shared by both student listings.
struct StudentQuery {
    student_id: String,
    range: DateRange,
}

impl StudentQuery {
    fn from_query(ctx: &RequestContext) -> Result<Self, ApiError> {
        let student_id = ctx
            .query_param("studentId")
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("Missing required parameter: studentId"))?;
        let range = DateRange::from_query(ctx, EndBound::Exact)?;
        Ok(Self { student_id, range })
    }

    /// The student's homework images, newest first.
    fn homework_images(&self) -> Criteria {
        Criteria::new(Table::HomeworkImages)
            .eq("studentId", self.student_id.as_str())
            .since("createdAt", self.range.start)
            .until("createdAt", self.range.end)
            .order_by("id", SortDirection::Desc)
    }

    /// Echo of the raw query values.
    fn params(&self, ctx: &RequestContext) -> serde_json::Value {
        json!({
            "studentId": self.student_id,
            "startDate": ctx.query_param("startDate"),
            "endDate": ctx.query_param("endDate"),
        })
    }
}

fn empty_listing() -> serde_json::Value {
    json!({ "success": true, "data": [], "total": 0 })
}
