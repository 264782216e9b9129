use super::convert::{status_to_numeric, to_label_string};
use super::descriptor::{ColumnMetric, CompiledMapping};
use super::{CollectResult, Collector, fetch_table};
use crate::pgpool::{Backend, ColumnConversionError, StatusTable, Value};
use anyhow::Result;
use futures::future::BoxFuture;
use prometheus::Registry;
use semver::Version;
use tracing::{debug, instrument};

/// Column holding a backend node state such as `up` or `down`.
const STATUS_COLUMN: &str = "status";

/// Publishes one sample per (row, metric column) of a status table.
#[derive(Clone)]
pub struct NamespaceCollector {
    mapping: CompiledMapping,
}

impl NamespaceCollector {
    #[must_use]
    pub fn new(mapping: CompiledMapping) -> Self {
        Self { mapping }
    }

    /// Publishes the samples of `table`, returning the cells that could not be
    /// converted. A failed cell only drops its own sample.
    pub fn apply(&self, table: &StatusTable) -> Vec<ColumnConversionError> {
        let mut errors = Vec::new();

        for row in &table.rows {
            // Labels missing from the result are exported empty.
            let label_values: Vec<String> = self
                .mapping
                .labels
                .iter()
                .map(|label| row.get(label).and_then(to_label_string).unwrap_or_default())
                .collect();
            let label_values: Vec<&str> = label_values.iter().map(String::as_str).collect();

            for (column, value) in row.iter() {
                let Some(metric @ ColumnMetric::Metric(descriptor)) = self.mapping.columns.get(column)
                else {
                    continue;
                };

                let sample = if column == STATUS_COLUMN {
                    to_label_string(value).map(|status| status_to_numeric(&status))
                } else {
                    metric.convert(value)
                };

                let Some(sample) = sample else {
                    errors.push(self.conversion_error(column, value));
                    continue;
                };

                if let Err(e) = descriptor.emit(&label_values, sample) {
                    debug!(metric = %descriptor.name, error = %e, "dropping sample");
                    errors.push(self.conversion_error(column, value));
                }
            }
        }

        errors
    }

    fn conversion_error(&self, column: &str, value: &Value) -> ColumnConversionError {
        ColumnConversionError {
            table: self.mapping.table.to_string(),
            column: column.to_string(),
            value: format!("{value:?}"),
        }
    }
}

impl Collector for NamespaceCollector {
    fn name(&self) -> &'static str {
        self.mapping.table
    }

    fn since(&self) -> Option<&Version> {
        self.mapping.since.as_ref()
    }

    #[instrument(skip(self, registry), level = "info", err, fields(collector = "namespace"))]
    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        self.mapping.register(registry)
    }

    fn reset(&self) {
        self.mapping.reset();
    }

    fn collect<'a>(&'a self, backend: &'a dyn Backend) -> BoxFuture<'a, CollectResult> {
        Box::pin(async move {
            let table = fetch_table(backend, self.mapping.table).await?;

            debug!(table = self.mapping.table, rows = table.rows.len(), "scraping status table");

            Ok(self.apply(&table))
        })
    }
}
