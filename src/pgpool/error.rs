//! Error taxonomy of a scrape.
//!
//! Only [`ConnectionError`] aborts a scrape. [`TableQueryError`] is fatal for one
//! status table, [`ColumnConversionError`] drops one sample and
//! [`VersionDetectionError`] leaves the server version unknown.

use thiserror::Error;

/// Opening or probing the connection to Pgpool-II failed.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The connection could not be opened.
    #[error("error connecting to Pgpool-II: {0}")]
    Connect(#[source] sqlx::Error),

    /// The liveness query failed on an open connection.
    #[error("error pinging Pgpool-II: {0}")]
    Probe(#[source] sqlx::Error),

    /// There is no open connection to probe.
    #[error("no open connection to Pgpool-II")]
    NotConnected,
}

/// A `SHOW <table>` query could not be completed.
#[derive(Debug, Error)]
pub enum TableQueryError {
    /// The query itself failed (unknown table, lost connection, ...).
    #[error("error running query on table {table}: {source}")]
    Query {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// The result set could not be decoded into rows.
    #[error("error retrieving rows for table {table}: {source}")]
    Rows {
        table: String,
        #[source]
        source: sqlx::Error,
    },
}

impl TableQueryError {
    /// Status table the error belongs to.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Query { table, .. } | Self::Rows { table, .. } => table,
        }
    }
}

/// A single cell could not be turned into a sample.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unexpected error parsing column {table}.{column}: {value}")]
pub struct ColumnConversionError {
    pub table: String,
    pub column: String,
    /// Debug rendering of the offending cell.
    pub value: String,
}

/// `SHOW pool_version` did not yield a usable version.
#[derive(Debug, Error)]
pub enum VersionDetectionError {
    #[error("error querying SHOW pool_version: {0}")]
    Query(#[source] sqlx::Error),

    #[error("unexpected columns returned by SHOW pool_version: {0:?}")]
    UnexpectedColumns(Vec<String>),

    #[error("SHOW pool_version returned no rows")]
    Empty,

    #[error("could not parse Pgpool-II version from {0:?}")]
    Unparseable(String),
}
