//! Postgres backend.
//!
//! Queries are assembled at runtime with `QueryBuilder`; identifiers are checked
//! against `IDENTIFIER_REGEX` and quoted, every value is a bind parameter. Rows
//! come back as `to_jsonb(table.*)` so services decode them exactly like the
//! in-memory rows. Realtime changes arrive through `LISTEN chakshu_realtime`,
//! fed by the `chakshu_notify_change` trigger installed by the migrations.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgListener;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use super::query::{
    require_filters, validate_identifier, Filter, QueryResult, Scalar, SelectQuery,
};
use super::realtime::{RealtimeHub, RowChange};
use super::Backend;
use crate::core::error::{AppError, Result};
use crate::shared::constants::REALTIME_CHANNEL;

const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct PostgresBackend {
    pool: PgPool,
    hub: RealtimeHub,
    listener: JoinHandle<()>,
}

impl PostgresBackend {
    /// Wrap a pool and start forwarding `NOTIFY` payloads into the realtime hub.
    pub fn new(pool: PgPool) -> Self {
        let hub = RealtimeHub::new();
        let listener = tokio::spawn(forward_notifications(pool.clone(), hub.clone()));
        Self {
            pool,
            hub,
            listener,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl Drop for PostgresBackend {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn forward_notifications(pool: PgPool, hub: RealtimeHub) {
    loop {
        let mut listener = match PgListener::connect_with(&pool).await {
            Ok(listener) => listener,
            Err(e) => {
                tracing::error!("Realtime listener failed to connect: {:?}", e);
                tokio::time::sleep(LISTENER_RETRY_DELAY).await;
                continue;
            }
        };

        if let Err(e) = listener.listen(REALTIME_CHANNEL).await {
            tracing::error!("Failed to LISTEN on {}: {:?}", REALTIME_CHANNEL, e);
            tokio::time::sleep(LISTENER_RETRY_DELAY).await;
            continue;
        }
        tracing::info!("Realtime listener attached to channel '{}'", REALTIME_CHANNEL);

        loop {
            match listener.recv().await {
                Ok(notification) => {
                    match serde_json::from_str::<RowChange>(notification.payload()) {
                        Ok(change) => hub.publish(change),
                        Err(e) => tracing::warn!("Malformed realtime payload: {}", e),
                    }
                }
                Err(e) => {
                    tracing::warn!("Realtime listener disconnected: {:?}", e);
                    break;
                }
            }
        }

        tokio::time::sleep(LISTENER_RETRY_DELAY).await;
    }
}

fn push_ident(qb: &mut QueryBuilder<'_, Postgres>, name: &str) {
    qb.push("\"").push(name).push("\"");
}

fn push_column(qb: &mut QueryBuilder<'_, Postgres>, table: &str, column: &str) {
    push_ident(qb, table);
    qb.push(".");
    push_ident(qb, column);
}

fn push_scalar<'a>(qb: &mut QueryBuilder<'a, Postgres>, value: &Scalar) {
    match value {
        Scalar::Null => qb.push("NULL"),
        Scalar::Bool(b) => qb.push_bind(*b),
        Scalar::Int(i) => qb.push_bind(*i),
        Scalar::Float(f) => qb.push_bind(*f),
        Scalar::Text(s) => qb.push_bind(s.clone()),
        Scalar::Uuid(u) => qb.push_bind(*u),
        Scalar::Timestamp(t) => qb.push_bind(*t),
    };
}

fn push_comparison<'a>(
    qb: &mut QueryBuilder<'a, Postgres>,
    table: &str,
    column: &str,
    op: &str,
    value: &Scalar,
) {
    push_column(qb, table, column);
    qb.push(op);
    push_scalar(qb, value);
}

fn push_filter<'a>(qb: &mut QueryBuilder<'a, Postgres>, table: &str, filter: &Filter) {
    match filter {
        Filter::Eq(column, Scalar::Null) => {
            push_column(qb, table, column);
            qb.push(" IS NULL");
        }
        Filter::Neq(column, Scalar::Null) => {
            push_column(qb, table, column);
            qb.push(" IS NOT NULL");
        }
        Filter::Eq(column, value) => push_comparison(qb, table, column, " = ", value),
        Filter::Neq(column, value) => push_comparison(qb, table, column, " <> ", value),
        Filter::Gte(column, value) => push_comparison(qb, table, column, " >= ", value),
        Filter::Lte(column, value) => push_comparison(qb, table, column, " <= ", value),
        Filter::Ilike(column, pattern) => {
            push_column(qb, table, column);
            qb.push("::text ILIKE ").push_bind(pattern.clone());
        }
        Filter::Or(inner) if inner.is_empty() => {
            qb.push("FALSE");
        }
        Filter::Or(inner) => {
            qb.push("(");
            for (i, f) in inner.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                push_filter(qb, table, f);
            }
            qb.push(")");
        }
    }
}

fn push_where<'a>(qb: &mut QueryBuilder<'a, Postgres>, table: &str, filters: &[Filter]) {
    for (i, filter) in filters.iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        push_filter(qb, table, filter);
    }
}

fn push_returning(qb: &mut QueryBuilder<'_, Postgres>, table: &str) {
    qb.push(" RETURNING to_jsonb(");
    push_ident(qb, table);
    qb.push(".*) AS row");
}

fn object_columns(value: &Value, what: &str) -> Result<Vec<String>> {
    let Value::Object(map) = value else {
        return Err(AppError::Internal(format!("{} expects a JSON object", what)));
    };
    let columns: Vec<String> = map.keys().cloned().collect();
    for column in &columns {
        validate_identifier(column)?;
    }
    Ok(columns)
}

fn db_error(context: &str, table: &str, e: sqlx::Error) -> AppError {
    tracing::error!("{} on {} failed: {:?}", context, table, e);
    AppError::from_database(e)
}

#[async_trait]
impl Backend for PostgresBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn select(&self, query: SelectQuery) -> Result<QueryResult> {
        query.validate()?;
        let table = query.table.as_str();

        let count = if query.count {
            let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM ");
            push_ident(&mut qb, table);
            push_where(&mut qb, table, &query.filters);
            let total: i64 = qb
                .build_query_scalar()
                .fetch_one(&self.pool)
                .await
                .map_err(|e| db_error("Count", table, e))?;
            Some(total)
        } else {
            None
        };

        if query.head {
            return Ok(QueryResult {
                data: Vec::new(),
                count,
            });
        }

        let mut qb = QueryBuilder::<Postgres>::new("SELECT ");
        if query.columns.is_empty() {
            qb.push("to_jsonb(");
            push_ident(&mut qb, table);
            qb.push(".*)");
        } else {
            qb.push("jsonb_build_object(");
            for (i, column) in query.columns.iter().enumerate() {
                if i > 0 {
                    qb.push(", ");
                }
                // Identifier already validated, safe to inline as a literal key
                qb.push("'").push(column).push("', ");
                push_column(&mut qb, table, column);
            }
            qb.push(")");
        }
        qb.push(" AS row FROM ");
        push_ident(&mut qb, table);
        push_where(&mut qb, table, &query.filters);

        if let Some(order) = &query.order {
            qb.push(" ORDER BY ");
            push_column(&mut qb, table, &order.column);
            qb.push(if order.ascending { " ASC" } else { " DESC" });
        }

        if let Some((from, to)) = query.range {
            qb.push(" LIMIT ")
                .push_bind(to - from + 1)
                .push(" OFFSET ")
                .push_bind(from);
        }

        let data: Vec<Value> = qb
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Select", table, e))?;

        Ok(QueryResult { data, count })
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        validate_identifier(table)?;
        let columns = object_columns(&row, "Insert")?;

        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO ");
        push_ident(&mut qb, table);
        if columns.is_empty() {
            qb.push(" DEFAULT VALUES");
        } else {
            // jsonb_populate_record coerces each JSON value into the column type,
            // so uuids, timestamps and numerics can travel as strings.
            let list = columns
                .iter()
                .map(|c| format!("\"{}\"", c))
                .collect::<Vec<_>>()
                .join(", ");
            qb.push(" (").push(&list).push(") SELECT ").push(&list);
            qb.push(" FROM jsonb_populate_record(NULL::");
            push_ident(&mut qb, table);
            qb.push(", ").push_bind(row).push(")");
        }
        push_returning(&mut qb, table);

        let result: Value = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Insert", table, e))?;
        Ok(result)
    }

    async fn update(&self, table: &str, filters: Vec<Filter>, patch: Value) -> Result<Vec<Value>> {
        validate_identifier(table)?;
        require_filters(&filters)?;
        let columns = object_columns(&patch, "Update")?;
        if columns.is_empty() {
            return Err(AppError::Internal("Update with an empty patch".to_string()));
        }

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE ");
        push_ident(&mut qb, table);
        qb.push(" SET ");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            push_ident(&mut qb, column);
            qb.push(" = \"_patch\".");
            push_ident(&mut qb, column);
        }
        qb.push(" FROM jsonb_populate_record(NULL::");
        push_ident(&mut qb, table);
        qb.push(", ").push_bind(patch).push(") AS \"_patch\"");
        push_where(&mut qb, table, &filters);
        push_returning(&mut qb, table);

        let result: Vec<Value> = qb
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Update", table, e))?;
        Ok(result)
    }

    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<Vec<Value>> {
        validate_identifier(table)?;
        require_filters(&filters)?;

        let mut qb = QueryBuilder::<Postgres>::new("DELETE FROM ");
        push_ident(&mut qb, table);
        push_where(&mut qb, table, &filters);
        push_returning(&mut qb, table);

        let result: Vec<Value> = qb
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Delete", table, e))?;
        Ok(result)
    }

    fn realtime(&self) -> &RealtimeHub {
        &self.hub
    }

    async fn ping(&self) -> Result<Duration> {
        let started = Instant::now();
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Ping", "database", e))?;
        Ok(started.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(table: &str, filters: &[Filter]) -> String {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT 1 FROM ");
        push_ident(&mut qb, table);
        push_where(&mut qb, table, filters);
        qb.sql().to_string()
    }

    #[test]
    fn filters_render_as_bound_predicates() {
        let sql = render(
            "reports",
            &[
                Filter::eq("status", "pending"),
                Filter::gte("amount_involved", 10000.0),
                Filter::Or(vec![
                    Filter::ilike("title", "%upi%"),
                    Filter::ilike("description", "%upi%"),
                ]),
            ],
        );
        assert_eq!(
            sql,
            "SELECT 1 FROM \"reports\" WHERE \"reports\".\"status\" = $1 \
             AND \"reports\".\"amount_involved\" >= $2 \
             AND (\"reports\".\"title\"::text ILIKE $3 OR \"reports\".\"description\"::text ILIKE $4)"
        );
    }

    #[test]
    fn null_comparisons_use_is_null() {
        let sql = render(
            "reports",
            &[
                Filter::eq("resolved_at", Scalar::Null),
                Filter::neq("reviewed_by", Scalar::Null),
            ],
        );
        assert!(sql.ends_with(
            "WHERE \"reports\".\"resolved_at\" IS NULL AND \"reports\".\"reviewed_by\" IS NOT NULL"
        ));
    }

    #[test]
    fn empty_or_matches_nothing() {
        let sql = render("reports", &[Filter::Or(Vec::new())]);
        assert!(sql.ends_with("WHERE FALSE"));
    }
}
