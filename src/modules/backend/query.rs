//! Query builder for the backend collaborator.
//!
//! Mirrors the hosted-store surface the services are written against:
//! `table(name).select(cols).eq/gte/lte/ilike/or(..).order(col, asc).range(from, to)`.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::shared::validation::IDENTIFIER_REGEX;

/// A typed scalar bound into a filter.
///
/// Postgres compares against typed parameters, the in-memory backend
/// compares against the JSON form of the row.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
}

impl Scalar {
    pub fn to_json(&self) -> Value {
        match self {
            Scalar::Null => Value::Null,
            Scalar::Bool(b) => Value::Bool(*b),
            Scalar::Int(i) => Value::from(*i),
            Scalar::Float(f) => Value::from(*f),
            Scalar::Text(s) => Value::String(s.clone()),
            Scalar::Uuid(u) => Value::String(u.to_string()),
            Scalar::Timestamp(t) => Value::String(t.to_rfc3339()),
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Int(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Float(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Text(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Text(v)
    }
}

impl From<Uuid> for Scalar {
    fn from(v: Uuid) -> Self {
        Scalar::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Scalar {
    fn from(v: DateTime<Utc>) -> Self {
        Scalar::Timestamp(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Scalar),
    Neq(String, Scalar),
    Gte(String, Scalar),
    Lte(String, Scalar),
    /// Case-insensitive SQL `ILIKE` pattern
    Ilike(String, String),
    /// Any of the nested filters
    Or(Vec<Filter>),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Scalar>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn neq(column: &str, value: impl Into<Scalar>) -> Self {
        Filter::Neq(column.to_string(), value.into())
    }

    pub fn gte(column: &str, value: impl Into<Scalar>) -> Self {
        Filter::Gte(column.to_string(), value.into())
    }

    pub fn lte(column: &str, value: impl Into<Scalar>) -> Self {
        Filter::Lte(column.to_string(), value.into())
    }

    pub fn ilike(column: &str, pattern: impl Into<String>) -> Self {
        Filter::Ilike(column.to_string(), pattern.into())
    }

    fn columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Filter::Eq(c, _)
            | Filter::Neq(c, _)
            | Filter::Gte(c, _)
            | Filter::Lte(c, _)
            | Filter::Ilike(c, _) => out.push(c),
            Filter::Or(inner) => inner.iter().for_each(|f| f.columns(out)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// A `select` against one table.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub table: String,
    /// Empty means every column
    pub columns: Vec<String>,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    /// Inclusive row range `(from, to)`
    pub range: Option<(i64, i64)>,
    pub count: bool,
    /// Only the count is wanted, no rows
    pub head: bool,
}

impl SelectQuery {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            filters: Vec::new(),
            order: None,
            range: None,
            count: false,
            head: false,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn eq(self, column: &str, value: impl Into<Scalar>) -> Self {
        self.filter(Filter::eq(column, value))
    }

    pub fn gte(self, column: &str, value: impl Into<Scalar>) -> Self {
        self.filter(Filter::gte(column, value))
    }

    pub fn lte(self, column: &str, value: impl Into<Scalar>) -> Self {
        self.filter(Filter::lte(column, value))
    }

    pub fn ilike(self, column: &str, pattern: impl Into<String>) -> Self {
        self.filter(Filter::ilike(column, pattern))
    }

    pub fn or(self, filters: Vec<Filter>) -> Self {
        self.filter(Filter::Or(filters))
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn range(mut self, from: i64, to: i64) -> Self {
        self.range = Some((from.max(0), to.max(from.max(0))));
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Count matching rows without returning any
    pub fn count_only(mut self) -> Self {
        self.count = true;
        self.head = true;
        self
    }

    /// Reject identifiers that could not have come from our own code.
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table)?;
        for column in &self.columns {
            validate_identifier(column)?;
        }
        validate_filters(&self.filters)?;
        if let Some(order) = &self.order {
            validate_identifier(&order.column)?;
        }
        Ok(())
    }
}

pub fn validate_identifier(name: &str) -> Result<()> {
    if IDENTIFIER_REGEX.is_match(name) {
        Ok(())
    } else {
        Err(AppError::Internal(format!("Invalid identifier: {:?}", name)))
    }
}

pub fn validate_filters(filters: &[Filter]) -> Result<()> {
    let mut columns = Vec::new();
    filters.iter().for_each(|f| f.columns(&mut columns));
    columns.into_iter().try_for_each(validate_identifier)
}

/// Updates and deletes must name the rows they touch.
pub fn require_filters(filters: &[Filter]) -> Result<()> {
    if filters.is_empty() {
        return Err(AppError::Internal(
            "Refusing to write without a filter".to_string(),
        ));
    }
    validate_filters(filters)
}

/// Rows returned by a select, plus the total match count when requested.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub data: Vec<Value>,
    pub count: Option<i64>,
}

impl QueryResult {
    /// Deserialize every row into `T`.
    pub fn rows<T: serde::de::DeserializeOwned>(self) -> Result<Vec<T>> {
        self.data.into_iter().map(decode_row).collect()
    }
}

pub fn decode_row<T: serde::de::DeserializeOwned>(row: Value) -> Result<T> {
    serde_json::from_value(row)
        .map_err(|e| AppError::Internal(format!("Failed to decode row: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_filters_in_order() {
        let query = SelectQuery::from("reports")
            .eq("status", "pending")
            .gte("amount_involved", 1000.0)
            .or(vec![
                Filter::ilike("title", "%upi%"),
                Filter::ilike("description", "%upi%"),
            ])
            .order("created_at", false)
            .range(20, 39)
            .with_count();

        assert_eq!(query.filters.len(), 3);
        assert_eq!(query.range, Some((20, 39)));
        assert!(query.count);
        assert!(!query.head);
        assert!(query.validate().is_ok());
    }

    #[test]
    fn rejects_injected_identifiers() {
        let query = SelectQuery::from("reports").eq("status; DROP TABLE reports", "x");
        assert!(query.validate().is_err());

        let query = SelectQuery::from("reports").order("created_at desc", true);
        assert!(query.validate().is_err());
    }

    #[test]
    fn range_never_goes_negative() {
        let query = SelectQuery::from("reports").range(-5, -1);
        assert_eq!(query.range, Some((0, 0)));
    }
}
