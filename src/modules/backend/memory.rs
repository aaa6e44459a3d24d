//! In-process backend used for tests and demo runs.
//!
//! Tables are vectors of JSON objects kept in insertion order. Inserts fill in
//! `id`, `created_at` and `updated_at` the way the Postgres column defaults do,
//! and every write is published on the realtime hub after the lock is released.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::query::{require_filters, validate_identifier, Filter, QueryResult, Scalar, SelectQuery};
use super::realtime::{ChangeEvent, RealtimeHub, RowChange};
use super::Backend;
use crate::core::error::{AppError, Result};
use crate::shared::validation::ilike_to_regex;

type Row = Map<String, Value>;

#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    hub: RealtimeHub,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn select(&self, query: SelectQuery) -> Result<QueryResult> {
        query.validate()?;
        let tables = self.tables.read().await;
        let rows = tables.get(&query.table).map(Vec::as_slice).unwrap_or(&[]);

        let mut matched: Vec<&Row> = Vec::new();
        for row in rows {
            if row_matches(row, &query.filters)? {
                matched.push(row);
            }
        }

        if let Some(order) = &query.order {
            matched.sort_by(|a, b| {
                let ord = compare_json(
                    a.get(&order.column).unwrap_or(&Value::Null),
                    b.get(&order.column).unwrap_or(&Value::Null),
                );
                if order.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            });
        }

        let count = query.count.then_some(matched.len() as i64);
        if query.head {
            return Ok(QueryResult {
                data: Vec::new(),
                count,
            });
        }

        let selected: Vec<&Row> = match query.range {
            Some((from, to)) => matched
                .into_iter()
                .skip(from as usize)
                .take((to - from + 1) as usize)
                .collect(),
            None => matched,
        };

        let data = selected
            .into_iter()
            .map(|row| Value::Object(project(row, &query.columns)))
            .collect();

        Ok(QueryResult { data, count })
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        validate_identifier(table)?;
        let Value::Object(mut row) = row else {
            return Err(AppError::Internal("Insert expects a JSON object".to_string()));
        };
        for column in row.keys() {
            validate_identifier(column)?;
        }

        let now = Value::String(Utc::now().to_rfc3339());
        row.entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        row.entry("created_at").or_insert_with(|| now.clone());
        row.entry("updated_at").or_insert(now);

        {
            let mut tables = self.tables.write().await;
            let rows = tables.entry(table.to_string()).or_default();
            if rows.iter().any(|r| r.get("id") == row.get("id")) {
                return Err(AppError::Conflict("Record already exists".to_string()));
            }
            rows.push(row.clone());
        }

        let record = Value::Object(row);
        self.hub.publish(RowChange {
            table: table.to_string(),
            event: ChangeEvent::Insert,
            record: Some(record.clone()),
            old_record: None,
        });
        Ok(record)
    }

    async fn update(&self, table: &str, filters: Vec<Filter>, patch: Value) -> Result<Vec<Value>> {
        validate_identifier(table)?;
        require_filters(&filters)?;
        let Value::Object(patch) = patch else {
            return Err(AppError::Internal("Update expects a JSON object".to_string()));
        };
        for column in patch.keys() {
            validate_identifier(column)?;
        }

        let mut changes = Vec::new();
        {
            let mut tables = self.tables.write().await;
            if let Some(rows) = tables.get_mut(table) {
                let hits = matching_indices(rows, &filters)?;
                for index in hits {
                    let row = &mut rows[index];
                    let old = row.clone();
                    for (k, v) in &patch {
                        row.insert(k.clone(), v.clone());
                    }
                    changes.push((Value::Object(old), Value::Object(row.clone())));
                }
            }
        }

        let mut updated = Vec::with_capacity(changes.len());
        for (old, new) in changes {
            self.hub.publish(RowChange {
                table: table.to_string(),
                event: ChangeEvent::Update,
                record: Some(new.clone()),
                old_record: Some(old),
            });
            updated.push(new);
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<Vec<Value>> {
        validate_identifier(table)?;
        require_filters(&filters)?;

        let mut removed = Vec::new();
        {
            let mut tables = self.tables.write().await;
            if let Some(rows) = tables.get_mut(table) {
                // Highest index first so earlier removals keep later indices valid.
                for index in matching_indices(rows, &filters)?.into_iter().rev() {
                    removed.push(Value::Object(rows.remove(index)));
                }
                removed.reverse();
            }
        }

        for old in &removed {
            self.hub.publish(RowChange {
                table: table.to_string(),
                event: ChangeEvent::Delete,
                record: None,
                old_record: Some(old.clone()),
            });
        }
        Ok(removed)
    }

    fn realtime(&self) -> &RealtimeHub {
        &self.hub
    }

    async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        let _tables = self.tables.read().await;
        Ok(started.elapsed())
    }
}

fn project(row: &Row, columns: &[String]) -> Row {
    if columns.is_empty() {
        return row.clone();
    }
    columns
        .iter()
        .map(|c| (c.clone(), row.get(c).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// Evaluated before any mutation so a bad pattern leaves the table untouched.
fn matching_indices(rows: &[Row], filters: &[Filter]) -> Result<Vec<usize>> {
    let mut hits = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        if row_matches(row, filters)? {
            hits.push(index);
        }
    }
    Ok(hits)
}

fn row_matches(row: &Row, filters: &[Filter]) -> Result<bool> {
    for filter in filters {
        if !filter_matches(row, filter)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn cell<'r>(row: &'r Row, name: &str) -> &'r Value {
    row.get(name).unwrap_or(&Value::Null)
}

fn filter_matches(row: &Row, filter: &Filter) -> Result<bool> {
    Ok(match filter {
        Filter::Eq(column, Scalar::Null) => cell(row, column).is_null(),
        Filter::Eq(column, scalar) => compare_scalar(cell(row, column), scalar) == Some(Ordering::Equal),
        Filter::Neq(column, Scalar::Null) => !cell(row, column).is_null(),
        Filter::Neq(column, scalar) => matches!(
            compare_scalar(cell(row, column), scalar),
            Some(Ordering::Less | Ordering::Greater)
        ),
        Filter::Gte(column, scalar) => matches!(
            compare_scalar(cell(row, column), scalar),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Filter::Lte(column, scalar) => matches!(
            compare_scalar(cell(row, column), scalar),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Filter::Ilike(column, pattern) => {
            let re = ilike_to_regex(pattern)
                .map_err(|e| AppError::BadRequest(format!("Invalid search pattern: {}", e)))?;
            match cell(row, column) {
                Value::Null => false,
                Value::String(s) => re.is_match(s),
                other => re.is_match(&other.to_string()),
            }
        }
        Filter::Or(inner) => {
            let mut any = false;
            for f in inner {
                if filter_matches(row, f)? {
                    any = true;
                    break;
                }
            }
            any
        }
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        // Decimals serialize as strings
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|t| t.with_timezone(&Utc))
}

/// SQL-style comparison: anything against NULL is unknown (`None`).
fn compare_scalar(value: &Value, scalar: &Scalar) -> Option<Ordering> {
    match scalar {
        Scalar::Null => None,
        Scalar::Bool(b) => value.as_bool().map(|v| v.cmp(b)),
        Scalar::Int(i) => as_number(value).and_then(|v| v.partial_cmp(&(*i as f64))),
        Scalar::Float(f) => as_number(value).and_then(|v| v.partial_cmp(f)),
        Scalar::Text(s) => value.as_str().map(|v| v.cmp(s.as_str())),
        Scalar::Uuid(u) => value
            .as_str()
            .and_then(|v| Uuid::parse_str(v).ok())
            .map(|v| v.cmp(u)),
        Scalar::Timestamp(t) => as_timestamp(value).map(|v| v.cmp(t)),
    }
}

/// Ordering for `ORDER BY`: nulls sort last ascending, like Postgres.
fn compare_json(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(_), Value::Number(_)) => as_number(a)
            .partial_cmp(&as_number(b))
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => match (as_timestamp(a), as_timestamp(b)) {
            (Some(ta), Some(tb)) => ta.cmp(&tb),
            _ => x.cmp(y),
        },
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seeded() -> MemoryBackend {
        let backend = MemoryBackend::new();
        for (title, status, amount, created) in [
            ("UPI collect scam", "pending", 5000.0, "2025-01-01T10:00:00Z"),
            ("Fake job offer", "resolved", 120000.0, "2025-01-02T10:00:00Z"),
            ("Phishing SMS", "pending", 0.0, "2025-01-03T10:00:00Z"),
        ] {
            backend
                .insert(
                    "reports",
                    json!({
                        "title": title,
                        "status": status,
                        "amount_involved": amount,
                        "created_at": created,
                    }),
                )
                .await
                .unwrap();
        }
        backend
    }

    #[tokio::test]
    async fn insert_fills_defaults() {
        let backend = MemoryBackend::new();
        let row = backend.insert("reports", json!({"title": "x"})).await.unwrap();
        assert!(Uuid::parse_str(row["id"].as_str().unwrap()).is_ok());
        assert!(row["created_at"].is_string());
        assert!(row["updated_at"].is_string());
    }

    #[tokio::test]
    async fn select_filters_orders_and_counts() {
        let backend = seeded().await;
        let result = backend
            .select(
                SelectQuery::from("reports")
                    .eq("status", "pending")
                    .order("created_at", false)
                    .with_count(),
            )
            .await
            .unwrap();

        assert_eq!(result.count, Some(2));
        let titles: Vec<&str> = result
            .data
            .iter()
            .map(|r| r["title"].as_str().unwrap())
            .collect();
        assert_eq!(titles, vec!["Phishing SMS", "UPI collect scam"]);
    }

    #[tokio::test]
    async fn range_applies_after_count() {
        let backend = seeded().await;
        let result = backend
            .select(
                SelectQuery::from("reports")
                    .order("created_at", true)
                    .range(1, 1)
                    .with_count(),
            )
            .await
            .unwrap();
        assert_eq!(result.count, Some(3));
        assert_eq!(result.data.len(), 1);
        assert_eq!(result.data[0]["title"], "Fake job offer");
    }

    #[tokio::test]
    async fn numeric_timestamp_and_ilike_filters() {
        let backend = seeded().await;

        let big = backend
            .select(SelectQuery::from("reports").gte("amount_involved", 10000.0))
            .await
            .unwrap();
        assert_eq!(big.data.len(), 1);

        let since: DateTime<Utc> = "2025-01-02T00:00:00Z".parse().unwrap();
        let recent = backend
            .select(SelectQuery::from("reports").gte("created_at", since).with_count())
            .await
            .unwrap();
        assert_eq!(recent.count, Some(2));

        let search = backend
            .select(SelectQuery::from("reports").or(vec![
                Filter::ilike("title", "%upi%"),
                Filter::ilike("title", "%job%"),
            ]))
            .await
            .unwrap();
        assert_eq!(search.data.len(), 2);
    }

    #[tokio::test]
    async fn update_and_delete_publish_changes() {
        let backend = seeded().await;
        let mut rx = backend.realtime().subscribe_raw();

        let updated = backend
            .update(
                "reports",
                vec![Filter::eq("title", "Phishing SMS")],
                json!({"status": "under_review"}),
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["status"], "under_review");

        let change = rx.recv().await.unwrap();
        assert_eq!(change.event, ChangeEvent::Update);
        assert_eq!(change.old_record.unwrap()["status"], "pending");

        let removed = backend
            .delete("reports", vec![Filter::eq("status", "resolved")])
            .await
            .unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(rx.recv().await.unwrap().event, ChangeEvent::Delete);

        let remaining = backend
            .select(SelectQuery::from("reports").count_only())
            .await
            .unwrap();
        assert_eq!(remaining.count, Some(2));
        assert!(remaining.data.is_empty());
    }
}
