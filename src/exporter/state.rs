//! Scrape orchestration: one long-lived [`Exporter`] owns the connection, the
//! compiled collectors and the health metrics.

use crate::collectors::{CollectorRegistry, ScrapeHealth, TableOutcome};
use crate::pgpool::{Backend, ConnectionError, ConnectionManager, Connector, version};
use anyhow::Result;
use prometheus::{Encoder, Registry, TextEncoder};
use semver::Version;
use std::sync::{Arc, PoisonError, RwLock as StdRwLock};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Outcome of one scrape.
#[derive(Debug)]
pub struct ScrapeReport {
    pub up: bool,
    /// Set when the connection could not be made live; no table was queried.
    pub connection_error: Option<ConnectionError>,
    pub tables: TableOutcome,
}

impl ScrapeReport {
    /// Whether `pgpool2_last_scrape_error` was raised.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.connection_error.is_some() || self.tables.has_errors()
    }
}

pub struct Exporter<C: Connector> {
    registry: Registry,
    health: ScrapeHealth,
    collectors: CollectorRegistry,
    /// Held for writing for a whole scrape, so concurrent pulls serialize.
    connection: RwLock<ConnectionManager<C>>,
    /// Connection probed by `/health`, refreshed after every liveness check.
    /// Never held across an await.
    current: StdRwLock<Option<Arc<C::Backend>>>,
    version: Option<Version>,
}

impl<C: Connector> Exporter<C> {
    /// Connects (retrying every `retry_interval` until it works), detects the
    /// Pgpool-II version once and registers every metric.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be registered.
    pub async fn connect(connector: C, retry_interval: Duration) -> Result<Self> {
        let manager = ConnectionManager::establish(connector, retry_interval).await;

        let version = match manager.backend() {
            Some(backend) => match version::detect(backend).await {
                Ok(v) => {
                    info!(pgpool_version = %v, "detected Pgpool-II version");
                    Some(v)
                }
                Err(e) => {
                    warn!(error = %e, "unable to detect Pgpool-II version, version gated tables are disabled");
                    None
                }
            },
            None => None,
        };

        Self::with_manager(manager, version)
    }

    /// Builds an exporter around an existing connection manager.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be registered.
    pub fn with_manager(manager: ConnectionManager<C>, version: Option<Version>) -> Result<Self> {
        let registry = Registry::new();

        let health = ScrapeHealth::new();
        health.register(&registry)?;

        let collectors = CollectorRegistry::new()?;
        collectors.register_metrics(&registry)?;

        Ok(Self {
            registry,
            health,
            collectors,
            current: StdRwLock::new(manager.shared()),
            connection: RwLock::new(manager),
            version,
        })
    }

    /// Version detected at startup, if any.
    #[must_use]
    pub fn server_version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    #[must_use]
    pub fn collectors(&self) -> &CollectorRegistry {
        &self.collectors
    }

    #[must_use]
    pub fn health(&self) -> &ScrapeHealth {
        &self.health
    }

    /// Runs one scrape: probe (reconnecting once), then every supported table.
    pub async fn scrape(&self) -> ScrapeReport {
        let mut connection = self.connection.write().await;
        self.scrape_locked(&mut connection).await
    }

    #[instrument(skip(self, connection), level = "info", fields(otel.kind = "internal"))]
    async fn scrape_locked(&self, connection: &mut ConnectionManager<C>) -> ScrapeReport {
        let _timer = self.health.start_scrape();

        let live = connection.ensure_live().await.map(|_| ());
        self.set_current(connection.shared());

        let backend = match live.and_then(|()| {
            connection
                .backend()
                .ok_or(ConnectionError::NotConnected)
        }) {
            Ok(backend) => backend,
            Err(e) => {
                self.health.set_up(false);
                self.health.set_error(true);
                self.collectors.reset_all();
                return ScrapeReport {
                    up: false,
                    connection_error: Some(e),
                    tables: TableOutcome::default(),
                };
            }
        };

        self.health.set_up(true);

        let tables = self
            .collectors
            .collect_all(backend, self.version.as_ref())
            .await;

        self.health.set_error(tables.has_errors());

        debug!(
            table_errors = tables.table_errors.len(),
            conversion_errors = tables.conversion_errors.len(),
            "scrape finished"
        );

        ScrapeReport {
            up: true,
            connection_error: None,
            tables,
        }
    }

    /// Scrapes and encodes every metric in the text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric families cannot be encoded.
    pub async fn render(&self) -> Result<String> {
        let mut connection = self.connection.write().await;
        self.scrape_locked(&mut connection).await;

        let families = self.registry.gather();

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;

        Ok(String::from_utf8(buffer)?)
    }

    /// Probes the current connection without reconnecting. Does not wait for
    /// a scrape in progress.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no connection or the probe fails.
    pub async fn health_check(&self) -> Result<(), ConnectionError> {
        let current = self
            .current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        match current {
            Some(backend) => backend.probe().await,
            None => Err(ConnectionError::NotConnected),
        }
    }

    fn set_current(&self, backend: Option<Arc<C::Backend>>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = backend;
    }

    /// Gathers the registry without scraping.
    #[must_use]
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }
}
