//! Driver seam: the traits the pool manages, and row shaping.
//!
//! The pool never talks to a socket itself. It manages boxed
//! [`Session`]s produced by a [`Connector`]; the production connector
//! lives in [`crate::vertica`], tests plug in mocks.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Error, Result};

/// A result row shaped as a field-name-to-value mapping.
pub type Row = serde_json::Map<String, Value>;

/// Raw output of one query: the column descriptor and the positional
/// row values, exactly as they arrive from the server. Field names and
/// values are zipped together in descriptor order by [`zip_rows`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOutput {
    /// Column names in descriptor order.
    pub columns: Vec<String>,
    /// Row values, positionally aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
}

/// One live, authenticated session to the database, able to execute one
/// query at a time. Exclusively owned: by the pool while checked in, by
/// the borrowing caller while checked out, never shared.
#[async_trait]
pub trait Session: Send + std::fmt::Debug {
    /// Executes a single SQL statement and returns its raw output.
    async fn execute(&mut self, sql: &str) -> Result<QueryOutput>;

    /// Tears the session down. Errors are interesting to logs only.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for new sessions; the pool creates connections on demand up
/// to its maximum through this seam.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establishes and authenticates a new session.
    async fn connect(&self) -> Result<Box<dyn Session>>;
}

/// Zips a [`QueryOutput`] into name→value rows in descriptor order.
///
/// Rows shorter than the descriptor are padded with nulls rather than
/// silently misaligned.
#[must_use]
pub fn zip_rows(output: QueryOutput) -> Vec<Row> {
    let QueryOutput { columns, rows } = output;
    rows.into_iter()
        .map(|values| {
            let mut values = values.into_iter();
            columns
                .iter()
                .map(|name| (name.clone(), values.next().unwrap_or(Value::Null)))
                .collect()
        })
        .collect()
}

/// Deserializes shaped rows into a typed record per row, failing loudly
/// on shape mismatch instead of handing back loosely-typed maps.
pub fn from_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(Value::Object(row)).map_err(|e| Error::RowShape(e.to_string()))
        })
        .collect()
}
