//! Dynamic SQL helpers: positional parameter binding and loosely-typed rows.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite};

/// A value bound to a `?` placeholder in a dynamic query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

/// Bind `params` to `query` in order.
pub fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(value) => query.bind(*value),
            SqlValue::Integer(value) => query.bind(*value),
            SqlValue::Real(value) => query.bind(*value),
            SqlValue::Text(value) => query.bind(value.clone()),
        };
    }
    query
}

/// A result row with every column read as nullable text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextRow {
    columns: HashMap<String, Option<String>>,
}

impl TextRow {
    pub fn from_sqlite(row: &SqliteRow) -> Self {
        let columns = row
            .columns()
            .iter()
            .map(|column| {
                // Unchecked so INTEGER and REAL columns coerce to their text form.
                let value = row
                    .try_get_unchecked::<Option<String>, _>(column.ordinal())
                    .ok()
                    .flatten();
                (column.name().to_string(), value)
            })
            .collect();
        Self { columns }
    }

    /// Column value, or `""` when the column is missing or NULL.
    pub fn get(&self, column: &str) -> &str {
        self.columns
            .get(column)
            .and_then(|value| value.as_deref())
            .unwrap_or("")
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TextRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(k, v)| (k.into(), Some(v.into())))
                .collect(),
        }
    }
}
