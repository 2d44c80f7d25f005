use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use super::error::StoreError;

/// Submission language; selects the English or Chinese table family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    En,
    Hk,
}

impl Lang {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "en" => Some(Lang::En),
            "hk" => Some(Lang::Hk),
            _ => None,
        }
    }
}

/// Logical data sources the handlers read from or write to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    /// Essay submissions (`userdata` / `c_userdata`).
    Submissions(Lang),
    /// Per-essay report scores joined back to the submission owner.
    ReportScores(Lang),
    OralUsage,
    OralReport,
    MemberLookup,
    TeacherAssignment,
    /// One row per uploaded homework attempt, keyed by student.
    HomeworkImages,
    /// Essay text and comments per homework image (`imagedata_full` / `c_imagedata_full`).
    EssayDetails(Lang),
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Submissions(Lang::En) => "userdata",
            Table::Submissions(Lang::Hk) => "c_userdata",
            Table::ReportScores(Lang::En) => "report_score",
            Table::ReportScores(Lang::Hk) => "report_score_c",
            Table::OralUsage => "oralUsage",
            Table::OralReport => "oralReport",
            Table::MemberLookup => "MemberLookup",
            Table::TeacherAssignment => "teacherAssignment",
            Table::HomeworkImages => "homeworkImages",
            Table::EssayDetails(Lang::En) => "imagedata_full",
            Table::EssayDetails(Lang::Hk) => "c_imagedata_full",
        }
    }

    /// Tables accepting upserts through `/oral/update`.
    pub fn is_writable(&self) -> bool {
        matches!(self, Table::OralUsage | Table::OralReport | Table::MemberLookup)
    }

    /// FROM clause for Postgres. Report scores resolve through the
    /// submission → pdf → image → full image → score chain.
    pub fn source_sql(&self) -> String {
        match self {
            Table::ReportScores(lang) => {
                let p = match lang {
                    Lang::En => "",
                    Lang::Hk => "c_",
                };
                format!(
                    "(SELECT u.\"ownerId\", u.\"YN\", u.\"Class\", u.\"UploadTime\", r.\"classno\", r.\"total_score\" \
                     FROM \"{p}userdata\" u \
                     INNER JOIN \"{p}pdfdata\" a ON u.\"id\" = a.\"userdata_id\" \
                     INNER JOIN \"{p}imagedata\" d ON a.\"id\" = d.\"pdfdata_id\" \
                     INNER JOIN \"{p}imagedata_full\" b ON d.\"id\" = b.\"id\" \
                     INNER JOIN \"{score}\" r ON b.\"id\" = r.\"id\") src",
                    p = p,
                    score = self.name(),
                )
            }
            other => format!("\"{}\"", other.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    EqIgnoreCase,
    In,
    NotIn,
    NotNull,
    /// Timestamp column at or after the value.
    Since,
    /// Timestamp column at or before the value.
    Until,
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub column: String,
    pub op: Op,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrderBy {
    pub column: String,
    pub sort: SortDirection,
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

/// Backend-neutral description of a row selection.
///
/// Conditions are AND-ed. Handlers build these; each `DataStore` decides how
/// to evaluate them.
#[derive(Debug, Clone)]
pub struct Criteria {
    pub table: Table,
    pub columns: Vec<String>,
    pub conditions: Vec<Condition>,
    pub order: Vec<OrderBy>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl Criteria {
    pub fn new(table: Table) -> Self {
        Self {
            table,
            columns: vec![],
            conditions: vec![],
            order: vec![],
            limit: None,
            offset: None,
        }
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    fn push(mut self, column: &str, op: Op, value: Value) -> Self {
        self.conditions.push(Condition {
            column: column.to_string(),
            op,
            value,
        });
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(column, Op::Eq, value.into())
    }

    /// Equality only when `value` is present.
    pub fn eq_opt(self, column: &str, value: Option<&str>) -> Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    pub fn eq_ignore_case(self, column: &str, value: impl Into<Value>) -> Self {
        self.push(column, Op::EqIgnoreCase, value.into())
    }

    pub fn within<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push(column, Op::In, Value::Array(values))
    }

    pub fn not_within<V: Into<Value>>(self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.push(column, Op::NotIn, Value::Array(values))
    }

    pub fn not_null(self, column: &str) -> Self {
        self.push(column, Op::NotNull, Value::Null)
    }

    pub fn since(self, column: &str, at: Option<NaiveDateTime>) -> Self {
        match at {
            Some(at) => self.push(column, Op::Since, Value::String(format_timestamp(&at))),
            None => self,
        }
    }

    pub fn until(self, column: &str, at: Option<NaiveDateTime>) -> Self {
        match at {
            Some(at) => self.push(column, Op::Until, Value::String(format_timestamp(&at))),
            None => self,
        }
    }

    pub fn order_by(mut self, column: &str, sort: SortDirection) -> Self {
        self.order.push(OrderBy {
            column: column.to_string(),
            sort,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// 1-based page of `page_size` rows.
    pub fn page(mut self, page: u32, page_size: u32) -> Self {
        self.limit = Some(page_size);
        self.offset = Some(page.saturating_sub(1).saturating_mul(page_size));
        self
    }

    pub fn to_sql(&self) -> Result<SqlResult, StoreError> {
        let (where_clause, params) = self.where_sql()?;
        let select_clause = self.select_sql()?;
        let order_clause = self.order_sql()?;
        let limit_clause = match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            _ => String::new(),
        };

        let inner = [
            format!("SELECT {}", select_clause),
            format!("FROM {}", self.table.source_sql()),
            format!("WHERE {}", where_clause),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult {
            query: format!("SELECT row_to_json(t) AS row FROM ({}) t", inner),
            params,
        })
    }

    pub fn to_count_sql(&self) -> Result<SqlResult, StoreError> {
        let (where_clause, params) = self.where_sql()?;
        Ok(SqlResult {
            query: format!(
                "SELECT COUNT(*) AS count FROM {} WHERE {}",
                self.table.source_sql(),
                where_clause
            ),
            params,
        })
    }

    fn select_sql(&self) -> Result<String, StoreError> {
        if self.columns.is_empty() {
            return Ok("*".to_string());
        }
        let mut out = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            out.push(quote_identifier(column)?);
        }
        Ok(out.join(", "))
    }

    fn order_sql(&self) -> Result<String, StoreError> {
        if self.order.is_empty() {
            return Ok(String::new());
        }
        let mut parts = Vec::with_capacity(self.order.len());
        for o in &self.order {
            parts.push(format!("{} {}", quote_identifier(&o.column)?, o.sort.to_sql()));
        }
        Ok(format!("ORDER BY {}", parts.join(", ")))
    }

    fn where_sql(&self) -> Result<(String, Vec<Value>), StoreError> {
        let mut params: Vec<Value> = vec![];
        let mut sql_conditions = vec![];

        for condition in &self.conditions {
            let column = quote_identifier(&condition.column)?;
            let sql = match condition.op {
                Op::Eq => {
                    if condition.value.is_null() {
                        format!("{} IS NULL", column)
                    } else {
                        format!("{} = {}", column, bind(condition.value.clone(), &mut params))
                    }
                }
                Op::EqIgnoreCase => {
                    format!("UPPER({}) = UPPER({})", column, bind(condition.value.clone(), &mut params))
                }
                Op::In | Op::NotIn => {
                    let values = condition.value.as_array().cloned().unwrap_or_default();
                    if values.is_empty() {
                        // IN () matches nothing, NOT IN () matches everything
                        if condition.op == Op::In { "1=0".to_string() } else { "1=1".to_string() }
                    } else {
                        let placeholders: Vec<String> =
                            values.into_iter().map(|v| bind(v, &mut params)).collect();
                        let keyword = if condition.op == Op::In { "IN" } else { "NOT IN" };
                        format!("{} {} ({})", column, keyword, placeholders.join(", "))
                    }
                }
                Op::NotNull => format!("{} IS NOT NULL", column),
                // the column is cast too since some tables keep timestamps as text
                Op::Since => format!("{}::timestamp >= {}::timestamp", column, bind(condition.value.clone(), &mut params)),
                Op::Until => format!("{}::timestamp <= {}::timestamp", column, bind(condition.value.clone(), &mut params)),
            };
            sql_conditions.push(sql);
        }

        let where_clause = if sql_conditions.is_empty() {
            "1=1".to_string()
        } else {
            sql_conditions.join(" AND ")
        };
        Ok((where_clause, params))
    }
}

fn bind(value: Value, params: &mut Vec<Value>) -> String {
    params.push(value);
    format!("${}", params.len())
}

/// Accept `[A-Za-z_][A-Za-z0-9_]*` only, then double-quote.
pub fn quote_identifier(name: &str) -> Result<String, StoreError> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name))
}

pub fn validate_identifier(name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(StoreError::InvalidColumn(name.to_string()));
    }
    Ok(())
}

pub fn format_timestamp(at: &NaiveDateTime) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Parse the timestamp shapes stores hand back: RFC 3339, naive date-time
/// (with `T` or space) or a bare date.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
