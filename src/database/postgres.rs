use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, postgres::PgPoolOptions, PgPool, Row as _};
use tracing::info;

use super::criteria::{quote_identifier, Criteria, Table};
use super::error::StoreError;
use super::store::{DataStore, Row, UpsertOutcome};
use crate::config::DatabaseConfig;

const ID_COLUMN: &str = "ID";

/// Postgres-backed store over a shared connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        info!("Created database pool (max_connections={})", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    fn updated_date_sql(table: Table) -> &'static str {
        match table {
            // MemberLookup stores the timestamp as text
            Table::MemberLookup => "to_char(NOW() AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS')",
            _ => "NOW() AT TIME ZONE 'UTC'",
        }
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn select(&self, criteria: &Criteria) -> Result<Vec<Row>, StoreError> {
        let sql = criteria.to_sql()?;
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let value: Value = row.try_get("row")?;
            if let Value::Object(map) = value {
                out.push(map);
            }
        }
        Ok(out)
    }

    async fn count(&self, criteria: &Criteria) -> Result<u64, StoreError> {
        let sql = criteria.to_count_sql()?;
        let mut q = sqlx::query(&sql.query);
        for p in sql.params.iter() {
            q = bind_param(q, p);
        }
        let row = q.fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn upsert(&self, table: Table, id: &Value, fields: &Row) -> Result<UpsertOutcome, StoreError> {
        if !table.is_writable() {
            return Err(StoreError::ReadOnlyTable(table.name()));
        }
        let table_sql = table.source_sql();
        let id_sql = quote_identifier(ID_COLUMN)?;
        let id_text = match id {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };

        let mut columns = Vec::with_capacity(fields.len());
        for key in fields.keys() {
            columns.push(quote_identifier(key)?);
        }
        let column_list = columns.join(", ");

        // Serialize upserts of one row so concurrent calls cannot both insert.
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(upsert_lock_key(table, &id_text))
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query(&format!(
            "SELECT 1 AS found FROM {} WHERE {}::text = $1",
            table_sql, id_sql
        ))
        .bind(&id_text)
        .fetch_optional(&mut *tx)
        .await?;

        // json_populate_record coerces JSON values to the column types
        let outcome = if existing.is_none() {
            let mut record = fields.clone();
            record.insert(ID_COLUMN.to_string(), id.clone());
            let insert_columns = if column_list.is_empty() {
                id_sql.clone()
            } else {
                format!("{}, {}", id_sql, column_list)
            };
            let sql = format!(
                "INSERT INTO {t} ({c}) SELECT {c} FROM json_populate_record(NULL::{t}, $1::json)",
                t = table_sql,
                c = insert_columns
            );
            sqlx::query(&sql)
                .bind(Value::Object(record))
                .execute(&mut *tx)
                .await?;
            UpsertOutcome::Created
        } else {
            let sql = if column_list.is_empty() {
                format!(
                    "UPDATE {t} SET \"Updated_Date\" = {now} WHERE {id}::text = $2",
                    t = table_sql,
                    now = Self::updated_date_sql(table),
                    id = id_sql
                )
            } else {
                format!(
                    "UPDATE {t} SET ({c}) = (SELECT {c} FROM json_populate_record(NULL::{t}, $1::json)), \
                     \"Updated_Date\" = {now} WHERE {id}::text = $2",
                    t = table_sql,
                    c = column_list,
                    now = Self::updated_date_sql(table),
                    id = id_sql
                )
            };
            sqlx::query(&sql)
                .bind(Value::Object(fields.clone()))
                .bind(&id_text)
                .execute(&mut *tx)
                .await?;
            UpsertOutcome::Updated
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}

/// Advisory lock key for one row of one table.
fn upsert_lock_key(table: Table, id: &str) -> String {
    format!("{}:{}", table.name(), id)
}

fn bind_param<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(u) = n.as_u64() {
                // Postgres has no u64
                q.bind(u as i64)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        // Criteria expands arrays into one placeholder per element
        Value::Array(_) => q.bind(v.clone()),
        Value::Object(_) => q.bind(v.clone()),
    }
}
