use crate::pgpool::{Backend, ColumnConversionError, StatusTable, TableQueryError};
use anyhow::Result;
use futures::future::BoxFuture;
use prometheus::Registry;
use semver::Version;

pub mod convert;
pub mod descriptor;
pub mod health;
pub mod mapping;
pub mod namespace;
pub mod pools;
pub mod processes;
pub mod registry;

pub use descriptor::{CompiledMapping, compile};
pub use health::{ScrapeHealth, ScrapeTimer};
pub use namespace::NamespaceCollector;
pub use pools::PoolsCollector;
pub use processes::ProcessesCollector;
pub use registry::{CollectorRegistry, TableOutcome};

/// Prefix of every exported metric name.
pub const NAMESPACE: &str = "pgpool2";

/// Result of scraping one status table: the per-cell conversion errors on
/// success, a [`TableQueryError`] when the table could not be read at all.
pub type CollectResult = Result<Vec<ColumnConversionError>, TableQueryError>;

/// A scraper for one Pgpool-II status table.
pub trait Collector {
    /// Status table this collector reads.
    fn name(&self) -> &'static str;

    /// First Pgpool-II release that exposes the table.
    fn since(&self) -> Option<&Version>;

    /// Register metrics with the prometheus registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric name is already registered.
    fn register_metrics(&self, registry: &Registry) -> Result<()>;

    /// Drop every sample published by a previous scrape.
    fn reset(&self);

    /// Query the table and publish its samples.
    fn collect<'a>(&'a self, backend: &'a dyn Backend) -> BoxFuture<'a, CollectResult>;
}

/// Every collector kind, dispatched by [`mapping::TableKind`].
#[derive(Clone)]
pub enum TableCollector {
    Namespace(NamespaceCollector),
    Processes(ProcessesCollector),
    Pools(PoolsCollector),
}

impl TableCollector {
    /// Builds the collector matching the kind of `mapping`.
    ///
    /// # Panics
    ///
    /// Panics if the fixed aggregate metric names are invalid (never happens).
    #[must_use]
    pub fn from_mapping(mapping: CompiledMapping) -> Self {
        match mapping.kind {
            mapping::TableKind::Namespace => Self::Namespace(NamespaceCollector::new(mapping)),
            mapping::TableKind::Processes => Self::Processes(ProcessesCollector::new(mapping)),
            mapping::TableKind::Pools => Self::Pools(PoolsCollector::new(mapping)),
        }
    }
}

impl Collector for TableCollector {
    fn name(&self) -> &'static str {
        match self {
            Self::Namespace(c) => c.name(),
            Self::Processes(c) => c.name(),
            Self::Pools(c) => c.name(),
        }
    }

    fn since(&self) -> Option<&Version> {
        match self {
            Self::Namespace(c) => c.since(),
            Self::Processes(c) => c.since(),
            Self::Pools(c) => c.since(),
        }
    }

    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        match self {
            Self::Namespace(c) => c.register_metrics(registry),
            Self::Processes(c) => c.register_metrics(registry),
            Self::Pools(c) => c.register_metrics(registry),
        }
    }

    fn reset(&self) {
        match self {
            Self::Namespace(c) => c.reset(),
            Self::Processes(c) => c.reset(),
            Self::Pools(c) => c.reset(),
        }
    }

    fn collect<'a>(&'a self, backend: &'a dyn Backend) -> BoxFuture<'a, CollectResult> {
        match self {
            Self::Namespace(c) => c.collect(backend),
            Self::Processes(c) => c.collect(backend),
            Self::Pools(c) => c.collect(backend),
        }
    }
}

/// Runs `SHOW <table>;`, sorting failures into query and row errors.
///
/// # Errors
///
/// Returns a [`TableQueryError`] if the query fails or its rows cannot be decoded.
pub async fn fetch_table(backend: &dyn Backend, table: &str) -> Result<StatusTable, TableQueryError> {
    backend.show(table).await.map_err(|source| match source {
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::Decode(_) => TableQueryError::Rows {
            table: table.to_string(),
            source,
        },
        _ => TableQueryError::Query {
            table: table.to_string(),
            source,
        },
    })
}
