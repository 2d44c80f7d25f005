use chrono::NaiveDateTime;
use serde::Serialize;

use crate::database::criteria::parse_timestamp;
use crate::database::Lang;
use crate::error::ApiError;
use crate::routing::RequestContext;

pub const MAX_PAGE_SIZE: u32 = 100;

/// `page` / `pageSize` query values, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
}

impl Pagination {
    pub fn from_query(ctx: &RequestContext, invalid_message: &str) -> Result<Self, ApiError> {
        let page = parse_u32(ctx.query_param("page"), 1);
        let page_size = parse_u32(ctx.query_param("pageSize"), 10);
        match (page, page_size) {
            (Some(page), Some(page_size)) if page >= 1 && (1..=MAX_PAGE_SIZE).contains(&page_size) => {
                Ok(Self { page, page_size })
            }
            _ => Err(ApiError::bad_request(invalid_message)),
        }
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.page_size))
    }

    pub fn summary(&self, total: u64) -> PageSummary {
        PageSummary {
            page: self.page,
            page_size: self.page_size,
            total_count: total,
            total_pages: self.total_pages(total),
            has_next: u64::from(self.page) * u64::from(self.page_size) < total,
            has_prev: self.page > 1,
        }
    }
}

pub const INVALID_PAGINATION: &str =
    "Invalid pagination parameters. Page must be >= 1, pageSize must be between 1 and 100";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSummary {
    pub page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

fn parse_u32(raw: Option<&str>, default: u32) -> Option<u32> {
    match raw {
        None => Some(default),
        Some(raw) => raw.trim().parse().ok(),
    }
}

/// `lang` query value, `en` when absent.
pub fn lang(ctx: &RequestContext) -> Result<Lang, ApiError> {
    match ctx.query_param("lang") {
        None => Ok(Lang::En),
        Some(raw) => {
            Lang::parse(raw).ok_or_else(|| ApiError::bad_request("Invalid lang parameter. Must be \"en\" or \"hk\""))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndBound {
    /// Use the timestamp as given.
    Exact,
    /// Move the end bound to 23:59:59.999 of its day.
    EndOfDay,
}

/// Optional `startDate` / `endDate` bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl DateRange {
    pub fn from_query(ctx: &RequestContext, end_bound: EndBound) -> Result<Self, ApiError> {
        let start = parse_date(ctx.query_param("startDate"), "startDate", "2024-01-01")?;
        let end = parse_date(ctx.query_param("endDate"), "endDate", "2024-12-31")?;
        let end = match end_bound {
            EndBound::Exact => end,
            EndBound::EndOfDay => end.and_then(|e| e.date().and_hms_milli_opt(23, 59, 59, 999)),
        };
        Ok(Self { start, end })
    }
}

fn parse_date(raw: Option<&str>, name: &str, example: &str) -> Result<Option<NaiveDateTime>, ApiError> {
    match raw {
        None => Ok(None),
        Some(raw) => parse_timestamp(raw).map(Some).ok_or_else(|| {
            ApiError::bad_request(format!(
                "Invalid {} format. Use ISO 8601 format (e.g., {})",
                name, example
            ))
        }),
    }
}
