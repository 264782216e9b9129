//! Access to a running Pgpool-II through its SQL-level `SHOW` commands.
//!
//! [`Connector`] opens connections and [`Backend`] runs status queries on one of
//! them. [`ConnectionManager`] owns the single live connection and replaces it
//! when the liveness probe fails.

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub mod dsn;
pub mod error;
pub mod postgres;
pub mod row;
pub mod version;

pub use error::{ColumnConversionError, ConnectionError, TableQueryError, VersionDetectionError};
pub use postgres::{PgBackend, PgConnector};
pub use row::{RawRow, StatusTable, Value};

/// Query used both as liveness probe and to read the server version.
pub const PROBE_QUERY: &str = "SHOW pool_version;";

/// An open connection able to answer status queries.
pub trait Backend: Send + Sync {
    /// Run the liveness query.
    fn probe(&self) -> BoxFuture<'_, Result<(), ConnectionError>>;

    /// Run `SHOW <table>;` and return every row.
    fn show<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<StatusTable, sqlx::Error>>;

    /// Release the connection.
    fn close(&self) -> BoxFuture<'_, ()>;
}

/// Opens connections to one fixed DSN.
pub trait Connector: Send + Sync + 'static {
    type Backend: Backend + 'static;

    fn connect(&self) -> BoxFuture<'_, Result<Self::Backend, ConnectionError>>;
}

/// Owns the single connection to Pgpool-II.
pub struct ConnectionManager<C: Connector> {
    connector: C,
    backend: Option<Arc<C::Backend>>,
}

impl<C: Connector> ConnectionManager<C> {
    /// Wraps a connector without connecting.
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            backend: None,
        }
    }

    /// Connects and probes, retrying every `retry_interval` until it works.
    pub async fn establish(connector: C, retry_interval: Duration) -> Self {
        let mut manager = Self::new(connector);
        let mut attempt: u64 = 1;

        loop {
            match manager.open().await {
                Ok(()) => {
                    info!(attempt, "connected to Pgpool-II");
                    return manager;
                }
                Err(e) => {
                    error!(attempt, error = %e, retry_in = ?retry_interval, "failed to connect to Pgpool-II");
                    tokio::time::sleep(retry_interval).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Current connection, if one is open.
    pub fn backend(&self) -> Option<&C::Backend> {
        self.backend.as_deref()
    }

    /// Shared handle to the current connection, usable without holding the manager.
    pub fn shared(&self) -> Option<Arc<C::Backend>> {
        self.backend.clone()
    }

    /// Probe the current connection, reconnecting once if the probe fails.
    ///
    /// # Errors
    ///
    /// Returns the error of the fresh connection when reconnecting fails too.
    pub async fn ensure_live(&mut self) -> Result<&C::Backend, ConnectionError> {
        let probe = match &self.backend {
            Some(backend) => backend.probe().await,
            None => Err(ConnectionError::NotConnected),
        };

        if let Err(e) = probe {
            error!(error = %e, "error pinging Pgpool-II");
            self.close().await;

            info!("reconnecting to Pgpool-II");
            if let Err(e) = self.open().await {
                error!(error = %e, "{}", reconnect_failure(&e));
                return Err(e);
            }
        }

        self.backend.as_deref().ok_or(ConnectionError::NotConnected)
    }

    async fn open(&mut self) -> Result<(), ConnectionError> {
        let backend = self.connector.connect().await?;

        if let Err(e) = backend.probe().await {
            backend.close().await;
            return Err(e);
        }

        self.backend = Some(Arc::new(backend));
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(backend) = self.backend.take() {
            backend.close().await;
        } else {
            warn!("no connection to close");
        }
    }
}

const fn reconnect_failure(error: &ConnectionError) -> &'static str {
    match error {
        ConnectionError::Probe(_) => "error pinging Pgpool-II after reconnect",
        ConnectionError::Connect(_) | ConnectionError::NotConnected => {
            "reconnect to Pgpool-II failed"
        }
    }
}
