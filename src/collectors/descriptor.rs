//! Compiles the static column mapping into Prometheus metric vectors.

use super::NAMESPACE;
use super::convert::to_float;
use super::mapping::{ColumnUsage, TableKind, TableMapping};
use crate::pgpool::Value;
use anyhow::Result;
use prometheus::{CounterVec, GaugeVec, Opts, Registry};
use semver::Version;
use std::collections::HashMap;
use std::sync::Arc;

/// Prometheus value type of a descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueType {
    Counter,
    Gauge,
}

#[derive(Clone)]
enum MetricVec {
    Counter(CounterVec),
    Gauge(GaugeVec),
}

/// A metric emitted once per row for one column of a status table.
#[derive(Clone)]
pub struct MetricDescriptor {
    pub name: String,
    pub help: &'static str,
    pub value_type: ValueType,
    /// Label names shared by every descriptor of the table.
    pub labels: Arc<[&'static str]>,
    vec: MetricVec,
}

impl MetricDescriptor {
    /// Creates the descriptor `<namespace>_<table>_<column>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or label names are not valid Prometheus identifiers.
    pub fn new(
        table: &str,
        column: &str,
        help: &'static str,
        value_type: ValueType,
        labels: Arc<[&'static str]>,
    ) -> Result<Self> {
        let name = format!("{NAMESPACE}_{table}_{column}");
        let opts = Opts::new(name.clone(), help);

        let vec = match value_type {
            ValueType::Counter => MetricVec::Counter(CounterVec::new(opts, &labels)?),
            ValueType::Gauge => MetricVec::Gauge(GaugeVec::new(opts, &labels)?),
        };

        Ok(Self {
            name,
            help,
            value_type,
            labels,
            vec,
        })
    }

    /// Records `value` for the given label values, replacing any earlier value.
    ///
    /// # Errors
    ///
    /// Returns an error if the label values do not match the label names, or a
    /// counter receives a negative or NaN value.
    pub fn emit(&self, label_values: &[&str], value: f64) -> prometheus::Result<()> {
        match &self.vec {
            MetricVec::Gauge(vec) => {
                vec.get_metric_with_label_values(label_values)?.set(value);
            }
            MetricVec::Counter(vec) => {
                if value.is_nan() || value < 0.0 {
                    return Err(prometheus::Error::Msg(format!(
                        "counter {} cannot be set to {value}",
                        self.name
                    )));
                }
                let counter = vec.get_metric_with_label_values(label_values)?;
                counter.reset();
                counter.inc_by(value);
            }
        }
        Ok(())
    }

    /// Drops every label set recorded so far.
    pub fn reset(&self) {
        match &self.vec {
            MetricVec::Counter(vec) => vec.reset(),
            MetricVec::Gauge(vec) => vec.reset(),
        }
    }

    /// Registers the underlying metric vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry already holds a metric with this name.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        match &self.vec {
            MetricVec::Counter(vec) => registry.register(Box::new(vec.clone()))?,
            MetricVec::Gauge(vec) => registry.register(Box::new(vec.clone()))?,
        }
        Ok(())
    }
}

/// The compiled role of one column.
#[derive(Clone)]
pub enum ColumnMetric {
    /// Present in the result but never emitted.
    Discard,
    /// Supplies a label value, never emitted on its own.
    Label,
    /// Emitted as its own metric.
    Metric(MetricDescriptor),
}

impl ColumnMetric {
    /// Converts a cell for this column. Discarded and label columns always
    /// yield a successful NaN.
    #[must_use]
    pub fn convert(&self, value: &Value) -> Option<f64> {
        match self {
            Self::Discard | Self::Label => Some(f64::NAN),
            Self::Metric(_) => to_float(value),
        }
    }
}

/// Everything needed to scrape one status table.
#[derive(Clone)]
pub struct CompiledMapping {
    pub table: &'static str,
    pub kind: TableKind,
    pub since: Option<Version>,
    pub labels: Arc<[&'static str]>,
    pub columns: HashMap<&'static str, ColumnMetric>,
}

impl CompiledMapping {
    /// Metric descriptors of the table, in no particular order.
    pub fn descriptors(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.columns.values().filter_map(|c| match c {
            ColumnMetric::Metric(d) => Some(d),
            ColumnMetric::Discard | ColumnMetric::Label => None,
        })
    }

    /// Registers every descriptor of the table.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric name clashes with one already registered.
    pub fn register(&self, registry: &Registry) -> Result<()> {
        for descriptor in self.descriptors() {
            descriptor.register(registry)?;
        }
        Ok(())
    }

    pub fn reset(&self) {
        for descriptor in self.descriptors() {
            descriptor.reset();
        }
    }
}

/// Compiles every table of `tables`.
///
/// # Errors
///
/// Returns an error if a table declares a column name that is not a valid
/// Prometheus identifier.
pub fn compile(tables: &[TableMapping]) -> Result<Vec<CompiledMapping>> {
    tables.iter().map(compile_table).collect()
}

fn compile_table(table: &TableMapping) -> Result<CompiledMapping> {
    let labels: Arc<[&'static str]> = table.labels().collect();

    let mut columns = HashMap::with_capacity(table.columns.len());
    for mapping in table.columns {
        let compiled = match mapping.usage {
            ColumnUsage::Discard => ColumnMetric::Discard,
            ColumnUsage::Label => ColumnMetric::Label,
            ColumnUsage::Counter => ColumnMetric::Metric(MetricDescriptor::new(
                table.table,
                mapping.column,
                mapping.description,
                ValueType::Counter,
                Arc::clone(&labels),
            )?),
            ColumnUsage::Gauge => ColumnMetric::Metric(MetricDescriptor::new(
                table.table,
                mapping.column,
                mapping.description,
                ValueType::Gauge,
                Arc::clone(&labels),
            )?),
            // Reserved usages have no conversion yet; the column is ignored.
            ColumnUsage::MappedMetric | ColumnUsage::Duration => continue,
        };
        columns.insert(mapping.column, compiled);
    }

    Ok(CompiledMapping {
        table: table.table,
        kind: table.kind,
        since: table.since.clone(),
        labels,
        columns,
    })
}
