//! Backend collaborator: relational store + realtime pub/sub.
//!
//! Services talk to the hosted store only through the [`Backend`] trait. Rows
//! travel as JSON objects; services decode them into typed models.

mod memory;
mod postgres;
mod query;
mod realtime;

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::core::error::Result;

pub use memory::MemoryBackend;
pub use postgres::PostgresBackend;
pub use query::{decode_row, Filter, Order, QueryResult, Scalar, SelectQuery};
pub use realtime::{ChangeEvent, Channel, RealtimeHub, RowChange, Subscription};

#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name for logs and health output
    fn name(&self) -> &'static str;

    async fn select(&self, query: SelectQuery) -> Result<QueryResult>;

    /// Insert one row and return it as stored (defaults filled in).
    async fn insert(&self, table: &str, row: Value) -> Result<Value>;

    /// Apply `patch` to every row matching `filters`; returns the updated rows.
    async fn update(&self, table: &str, filters: Vec<Filter>, patch: Value) -> Result<Vec<Value>>;

    /// Delete every row matching `filters`; returns the deleted rows.
    async fn delete(&self, table: &str, filters: Vec<Filter>) -> Result<Vec<Value>>;

    fn realtime(&self) -> &RealtimeHub;

    /// Round-trip latency of a trivial query.
    async fn ping(&self) -> Result<Duration>;
}

/// Fetch exactly one row, `None` when nothing matches.
pub async fn select_one(backend: &dyn Backend, query: SelectQuery) -> Result<Option<Value>> {
    let mut result = backend.select(query.range(0, 0)).await?;
    Ok(result.data.pop())
}
