use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use super::criteria::{Criteria, Table};
use super::error::StoreError;

/// One result row, column name → JSON value.
pub type Row = Map<String, Value>;

/// Whether an upsert created a new row or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl UpsertOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Created => "Created",
            UpsertOutcome::Updated => "Updated",
        }
    }
}

/// The data query capability handlers run against.
///
/// Implementations own the query language; callers only describe rows with
/// `Criteria`.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, criteria: &Criteria) -> Result<Vec<Row>, StoreError>;

    /// Row count for `criteria`, ignoring ordering and paging.
    async fn count(&self, criteria: &Criteria) -> Result<u64, StoreError>;

    /// Insert or update the row whose `ID` equals `id`. `fields` must not
    /// contain the id column.
    async fn upsert(&self, table: Table, id: &Value, fields: &Row) -> Result<UpsertOutcome, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    /// Release connections. Called once at shutdown.
    async fn close(&self) {}
}
