//! Frontend slot usage aggregated from `SHOW pool_processes`.
//!
//! Pgpool-II reports one row per child process. A child is in use when it is
//! bound to both a database and a user.

use super::convert::{to_label_string, usize_to_f64};
use super::descriptor::CompiledMapping;
use super::{CollectResult, Collector, NAMESPACE, fetch_table};
use crate::pgpool::{Backend, RawRow, StatusTable};
use anyhow::Result;
use futures::future::BoxFuture;
use prometheus::{GaugeVec, Opts, Registry};
use semver::Version;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

const NO_LABELS: &[&str] = &[];

/// Bound `(username, database)` of a status row, if both are set.
pub(crate) fn bound_user_database(row: &RawRow) -> Option<(String, String)> {
    let field = |column: &str| {
        row.get(column)
            .and_then(to_label_string)
            .unwrap_or_default()
    };

    let username = field("username");
    let database = field("database");

    (!username.is_empty() && !database.is_empty()).then_some((username, database))
}

/// Counts derived from one `SHOW pool_processes` result.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FrontendSummary {
    pub total: usize,
    pub used: usize,
    /// Used children per `(username, database)`.
    pub by_user_database: BTreeMap<(String, String), usize>,
}

impl FrontendSummary {
    /// Share of children in use. NaN when there are no children.
    #[must_use]
    pub fn used_ratio(&self) -> f64 {
        usize_to_f64(self.used) / usize_to_f64(self.total)
    }
}

/// Aggregates the rows of `SHOW pool_processes`.
#[must_use]
pub fn aggregate(table: &StatusTable) -> FrontendSummary {
    let mut summary = FrontendSummary {
        total: table.rows.len(),
        ..FrontendSummary::default()
    };

    for key in table.rows.iter().filter_map(bound_user_database) {
        summary.used += 1;
        *summary.by_user_database.entry(key).or_default() += 1;
    }

    summary
}

#[derive(Clone)]
pub struct ProcessesCollector {
    mapping: CompiledMapping,
    frontend_used: GaugeVec,
    frontend_total: GaugeVec,
    frontend_used_ratio: GaugeVec,
}

impl ProcessesCollector {
    /// Creates a new `ProcessesCollector`
    ///
    /// # Panics
    ///
    /// Panics if metric creation fails (should never happen with valid metric names)
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(mapping: CompiledMapping) -> Self {
        let frontend_used = GaugeVec::new(
            Opts::new("frontend_used", "Number of used child processes").namespace(NAMESPACE),
            &["username", "database"],
        )
        .expect("valid pgpool2_frontend_used metric opts");

        let frontend_total = GaugeVec::new(
            Opts::new("frontend_total", "Number of total child processed").namespace(NAMESPACE),
            NO_LABELS,
        )
        .expect("valid pgpool2_frontend_total metric opts");

        let frontend_used_ratio = GaugeVec::new(
            Opts::new(
                "frontend_used_ratio",
                "Ratio of child processes to total processes",
            )
            .namespace(NAMESPACE),
            NO_LABELS,
        )
        .expect("valid pgpool2_frontend_used_ratio metric opts");

        Self {
            mapping,
            frontend_used,
            frontend_total,
            frontend_used_ratio,
        }
    }

    /// Publishes the aggregate of `table`.
    pub fn apply(&self, table: &StatusTable) -> FrontendSummary {
        let summary = aggregate(table);

        for ((username, database), count) in &summary.by_user_database {
            self.frontend_used
                .with_label_values(&[username.as_str(), database.as_str()])
                .set(usize_to_f64(*count));
        }

        self.frontend_total
            .with_label_values(NO_LABELS)
            .set(usize_to_f64(summary.total));
        self.frontend_used_ratio
            .with_label_values(NO_LABELS)
            .set(summary.used_ratio());

        summary
    }
}

impl Collector for ProcessesCollector {
    fn name(&self) -> &'static str {
        self.mapping.table
    }

    fn since(&self) -> Option<&Version> {
        self.mapping.since.as_ref()
    }

    #[instrument(skip(self, registry), level = "info", err, fields(collector = "processes"))]
    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.frontend_used.clone()))?;
        registry.register(Box::new(self.frontend_total.clone()))?;
        registry.register(Box::new(self.frontend_used_ratio.clone()))?;
        Ok(())
    }

    fn reset(&self) {
        self.frontend_used.reset();
        self.frontend_total.reset();
        self.frontend_used_ratio.reset();
    }

    fn collect<'a>(&'a self, backend: &'a dyn Backend) -> BoxFuture<'a, CollectResult> {
        Box::pin(async move {
            let table = fetch_table(backend, self.mapping.table).await?;

            let summary = self.apply(&table);
            debug!(
                total = summary.total,
                used = summary.used,
                "aggregated frontend processes"
            );

            Ok(Vec::new())
        })
    }
}
