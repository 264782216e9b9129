//! `sqlx` implementation of [`Connector`] and [`Backend`].
//!
//! Pgpool-II answers `SHOW pool_*` only as plain queries, so everything runs
//! through [`sqlx::raw_sql`] (simple query protocol, text-format values).

use super::{Backend, ConnectionError, Connector, PROBE_QUERY, RawRow, StatusTable, Value};
use chrono::{DateTime, NaiveDateTime, Utc};
use futures::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::{debug, info_span};
use tracing_futures::Instrument as _;

/// Opens single-connection pools against a Pgpool-II DSN.
#[derive(Clone)]
pub struct PgConnector {
    dsn: SecretString,
}

impl PgConnector {
    #[must_use]
    pub fn new(dsn: SecretString) -> Self {
        Self { dsn }
    }
}

impl Connector for PgConnector {
    type Backend = PgBackend;

    fn connect(&self) -> BoxFuture<'_, Result<PgBackend, ConnectionError>> {
        Box::pin(async move {
            // At most one query in flight: Pgpool-II expects a single admin connection.
            // A health probe issued during a stuck query gives up after the acquire timeout.
            let pool = PgPoolOptions::new()
                .min_connections(0)
                .max_connections(1)
                .acquire_timeout(Duration::from_secs(5))
                .test_before_acquire(false)
                .connect(self.dsn.expose_secret())
                .await
                .map_err(ConnectionError::Connect)?;

            debug!("opened connection pool");

            Ok(PgBackend { pool })
        })
    }
}

/// A live connection to Pgpool-II.
#[derive(Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Run `sql` as a plain query and decode every row.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a cell cannot be read.
    pub async fn fetch_all(&self, sql: &str) -> Result<StatusTable, sqlx::Error> {
        let span = info_span!(
            "db.query",
            otel.kind = "client",
            db.system = "postgresql",
            db.operation = "SHOW",
            db.statement = %sql
        );

        let rows = sqlx::raw_sql(sql)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;

        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        let rows = rows
            .iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StatusTable { columns, rows })
    }
}

impl Backend for PgBackend {
    fn probe(&self) -> BoxFuture<'_, Result<(), ConnectionError>> {
        Box::pin(async move {
            let span = info_span!(
                "db.query",
                otel.kind = "client",
                db.system = "postgresql",
                db.operation = "SHOW",
                db.statement = PROBE_QUERY
            );

            sqlx::raw_sql(PROBE_QUERY)
                .execute(&self.pool)
                .instrument(span)
                .await
                .map_err(ConnectionError::Probe)?;

            Ok(())
        })
    }

    fn show<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<StatusTable, sqlx::Error>> {
        Box::pin(async move { self.fetch_all(&format!("SHOW {table};")).await })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.pool.close().await;
        })
    }
}

fn decode_row(row: &PgRow) -> Result<RawRow, sqlx::Error> {
    let mut raw = RawRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        raw.push(column.name(), decode_cell(row, idx)?);
    }
    Ok(raw)
}

fn decode_cell(row: &PgRow, idx: usize) -> Result<Value, sqlx::Error> {
    let cell = row.try_get_raw(idx)?;
    if cell.is_null() {
        return Ok(Value::Null);
    }
    let type_name = cell.type_info().name().to_string();

    let value = match type_name.as_str() {
        "INT2" => Value::Int(i64::from(row.try_get::<i16, _>(idx)?)),
        "INT4" => Value::Int(i64::from(row.try_get::<i32, _>(idx)?)),
        "INT8" => Value::Int(row.try_get::<i64, _>(idx)?),
        "FLOAT4" => Value::Float(f64::from(row.try_get::<f32, _>(idx)?)),
        "FLOAT8" => Value::Float(row.try_get::<f64, _>(idx)?),
        "BOOL" => Value::Bool(row.try_get::<bool, _>(idx)?),
        "TIMESTAMPTZ" => Value::Timestamp(row.try_get::<DateTime<Utc>, _>(idx)?),
        "TIMESTAMP" => Value::Timestamp(row.try_get::<NaiveDateTime, _>(idx)?.and_utc()),
        "BYTEA" => Value::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
        // Pgpool-II declares its status columns as text; anything else that
        // still decodes as UTF-8 is handed over as a string.
        _ => match row.try_get_unchecked::<String, _>(idx) {
            Ok(text) => Value::Text(text),
            Err(_) => Value::Unsupported(type_name),
        },
    };

    Ok(value)
}
