use super::mapping::{METRIC_MAPS, TableMapping};
use super::{Collector, TableCollector, compile};
use crate::pgpool::version::is_supported;
use crate::pgpool::{Backend, ColumnConversionError, TableQueryError};
use anyhow::Result;
use prometheus::Registry;
use semver::Version;
use std::collections::HashMap;
use tracing::{debug, info, info_span, warn};
use tracing_futures::Instrument as _;

/// What happened to the status tables during one scrape.
#[derive(Debug, Default)]
pub struct TableOutcome {
    /// Tables that could not be read at all.
    pub table_errors: HashMap<String, TableQueryError>,
    /// Cells that could not be converted; their samples were dropped.
    pub conversion_errors: Vec<ColumnConversionError>,
    /// Tables skipped because the server is too old or its version is unknown.
    pub skipped: Vec<&'static str>,
}

impl TableOutcome {
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.table_errors.is_empty()
    }
}

/// Every status table collector, in declaration order.
#[derive(Clone)]
pub struct CollectorRegistry {
    collectors: Vec<TableCollector>,
}

impl CollectorRegistry {
    /// Compiles the built-in status table mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the mapping yields an invalid metric descriptor.
    pub fn new() -> Result<Self> {
        Self::from_mappings(METRIC_MAPS)
    }

    /// Compiles `tables` once and builds one collector per table.
    ///
    /// # Errors
    ///
    /// Returns an error if a table yields an invalid metric descriptor.
    pub fn from_mappings(tables: &[TableMapping]) -> Result<Self> {
        let collectors = compile(tables)?
            .into_iter()
            .map(TableCollector::from_mapping)
            .collect();

        Ok(Self { collectors })
    }

    /// Registers the metrics of every collector.
    ///
    /// # Errors
    ///
    /// Returns an error if two collectors export the same metric name.
    pub fn register_metrics(&self, registry: &Registry) -> Result<()> {
        for collector in &self.collectors {
            collector.register_metrics(registry)?;
            debug!(collector = collector.name(), "registered metrics");
        }
        Ok(())
    }

    /// Drops every sample of the previous scrape.
    pub fn reset_all(&self) {
        for collector in &self.collectors {
            collector.reset();
        }
    }

    /// Scrapes every table sequentially, skipping tables `version` does not
    /// support. A failing table does not stop the others.
    pub async fn collect_all(&self, backend: &dyn Backend, version: Option<&Version>) -> TableOutcome {
        let mut outcome = TableOutcome::default();

        self.reset_all();

        for collector in &self.collectors {
            let name = collector.name();

            if !is_supported(collector.since(), version) {
                debug!(
                    table = name,
                    since = ?collector.since().map(ToString::to_string),
                    "skipping status table unsupported by this Pgpool-II version"
                );
                outcome.skipped.push(name);
                continue;
            }

            debug!(table = name, "querying status table");

            let span = info_span!("collector.collect", collector = %name, otel.kind = "internal");
            match collector.collect(backend).instrument(span).await {
                Ok(errors) => {
                    for e in &errors {
                        info!(error = %e, "error parsing");
                    }
                    outcome.conversion_errors.extend(errors);
                }
                Err(e) => {
                    warn!(table = name, error = %e, "status table disappeared");
                    outcome.table_errors.insert(name.to_string(), e);
                }
            }
        }

        outcome
    }

    pub fn collector_names(&self) -> Vec<&'static str> {
        self.collectors.iter().map(Collector::name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }
}
