use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use super::criteria::{parse_timestamp, validate_identifier, Condition, Criteria, Op, SortDirection, Table};
use super::error::StoreError;
use super::store::{DataStore, Row, UpsertOutcome};

/// In-process store evaluating `Criteria` over rows held in memory.
///
/// Used for local development without a database and by the test suites.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<Table, Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows; non-object values are ignored.
    pub async fn seed(&self, table: Table, rows: impl IntoIterator<Item = Value>) {
        let mut tables = self.tables.write().await;
        let entry = tables.entry(table).or_default();
        entry.extend(rows.into_iter().filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        }));
    }

    pub async fn rows(&self, table: Table) -> Vec<Row> {
        self.tables.read().await.get(&table).cloned().unwrap_or_default()
    }

    fn matching<'a>(rows: &'a [Row], criteria: &Criteria) -> Result<Vec<&'a Row>, StoreError> {
        for c in &criteria.conditions {
            validate_identifier(&c.column)?;
        }
        Ok(rows
            .iter()
            .filter(|row| criteria.conditions.iter().all(|c| condition_holds(row, c)))
            .collect())
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, criteria: &Criteria) -> Result<Vec<Row>, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables.get(&criteria.table).map(Vec::as_slice).unwrap_or(&[]);
        let mut selected = Self::matching(rows, criteria)?;

        for o in &criteria.order {
            validate_identifier(&o.column)?;
        }
        selected.sort_by(|a, b| {
            for o in &criteria.order {
                let ord = compare_values(a.get(&o.column), b.get(&o.column));
                let ord = match o.sort {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let offset = criteria.offset.unwrap_or(0) as usize;
        let limit = criteria.limit.map(|l| l as usize).unwrap_or(usize::MAX);

        Ok(selected
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| {
                if criteria.columns.is_empty() {
                    row.clone()
                } else {
                    criteria
                        .columns
                        .iter()
                        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
                        .collect()
                }
            })
            .collect())
    }

    async fn count(&self, criteria: &Criteria) -> Result<u64, StoreError> {
        let tables = self.tables.read().await;
        let rows = tables.get(&criteria.table).map(Vec::as_slice).unwrap_or(&[]);
        Ok(Self::matching(rows, criteria)?.len() as u64)
    }

    async fn upsert(&self, table: Table, id: &Value, fields: &Row) -> Result<UpsertOutcome, StoreError> {
        if !table.is_writable() {
            return Err(StoreError::ReadOnlyTable(table.name()));
        }
        for key in fields.keys() {
            validate_identifier(key)?;
        }

        let mut tables = self.tables.write().await;
        let rows = tables.entry(table).or_default();
        let key = id_text(id);

        if let Some(row) = rows.iter_mut().find(|r| r.get("ID").map(id_text).as_deref() == Some(key.as_str())) {
            for (k, v) in fields {
                row.insert(k.clone(), v.clone());
            }
            row.insert(
                "Updated_Date".to_string(),
                Value::String(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            );
            return Ok(UpsertOutcome::Updated);
        }

        let mut row = fields.clone();
        row.insert("ID".to_string(), id.clone());
        rows.push(row);
        Ok(UpsertOutcome::Created)
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn id_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn condition_holds(row: &Row, condition: &Condition) -> bool {
    let actual = row.get(&condition.column).unwrap_or(&Value::Null);
    match condition.op {
        Op::Eq => values_equal(actual, &condition.value),
        Op::EqIgnoreCase => match (actual.as_str(), condition.value.as_str()) {
            (Some(a), Some(b)) => a.to_uppercase() == b.to_uppercase(),
            _ => false,
        },
        Op::In => condition
            .value
            .as_array()
            .map(|vs| vs.iter().any(|v| values_equal(actual, v)))
            .unwrap_or(false),
        // SQL NOT IN never matches NULL
        Op::NotIn => {
            !actual.is_null()
                && !condition
                    .value
                    .as_array()
                    .map(|vs| vs.iter().any(|v| values_equal(actual, v)))
                    .unwrap_or(false)
        }
        Op::NotNull => !actual.is_null(),
        Op::Since | Op::Until => {
            let bound = condition.value.as_str().and_then(parse_timestamp);
            let value = actual.as_str().and_then(parse_timestamp);
            match (value, bound) {
                (Some(v), Some(b)) if condition.op == Op::Since => v >= b,
                (Some(v), Some(b)) => v <= b,
                _ => false,
            }
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(tx), Some(ty)) => tx.cmp(&ty),
            _ => x.cmp(y),
        },
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
