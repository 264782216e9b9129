//! Backend connection slot usage aggregated from `SHOW pool_pools`.
//!
//! Every row is one (child process, pool slot, backend node) combination. A slot
//! is in use when it carries both a user and a database.

use super::convert::{to_label_string, usize_to_f64};
use super::descriptor::CompiledMapping;
use super::processes::bound_user_database;
use super::{CollectResult, Collector, NAMESPACE, fetch_table};
use crate::pgpool::{Backend, RawRow, StatusTable};
use anyhow::Result;
use futures::future::BoxFuture;
use prometheus::{GaugeVec, Opts, Registry};
use semver::Version;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

const NO_LABELS: &[&str] = &[];

/// Group key of a used slot, ordered process, pool slot, backend, user, database.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SlotKey {
    pub pool_pid: String,
    pub pool_id: String,
    pub backend_id: String,
    pub username: String,
    pub database: String,
}

/// Slot counts of one child process.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessSlots {
    pub total: usize,
    pub used: usize,
}

impl ProcessSlots {
    /// NaN when the process has no slots.
    #[must_use]
    pub fn used_ratio(&self) -> f64 {
        usize_to_f64(self.used) / usize_to_f64(self.total)
    }
}

/// Counts derived from one `SHOW pool_pools` result.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackendSummary {
    pub total: usize,
    pub used: usize,
    pub by_process: BTreeMap<String, ProcessSlots>,
    pub by_slot: BTreeMap<SlotKey, usize>,
}

impl BackendSummary {
    /// NaN when there are no slots at all.
    #[must_use]
    pub fn used_ratio(&self) -> f64 {
        usize_to_f64(self.used) / usize_to_f64(self.total)
    }
}

fn label(row: &RawRow, column: &str) -> String {
    row.get(column)
        .and_then(to_label_string)
        .unwrap_or_default()
}

/// Aggregates the rows of `SHOW pool_pools`.
#[must_use]
pub fn aggregate(table: &StatusTable) -> BackendSummary {
    let mut summary = BackendSummary::default();

    for row in &table.rows {
        let pool_pid = label(row, "pool_pid");

        summary.total += 1;
        let process = summary.by_process.entry(pool_pid.clone()).or_default();
        process.total += 1;

        let Some((username, database)) = bound_user_database(row) else {
            continue;
        };

        summary.used += 1;
        process.used += 1;

        let key = SlotKey {
            pool_pid,
            pool_id: label(row, "pool_id"),
            backend_id: label(row, "backend_id"),
            username,
            database,
        };
        *summary.by_slot.entry(key).or_default() += 1;
    }

    summary
}

#[derive(Clone)]
pub struct PoolsCollector {
    mapping: CompiledMapping,
    by_process_used: GaugeVec,
    by_process_total: GaugeVec,
    by_process_used_ratio: GaugeVec,
    backend_total: GaugeVec,
    backend_used: GaugeVec,
    backend_used_ratio: GaugeVec,
}

impl PoolsCollector {
    /// Creates a new `PoolsCollector`
    ///
    /// # Panics
    ///
    /// Panics if metric creation fails (should never happen with valid metric names)
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new(mapping: CompiledMapping) -> Self {
        let gauge = |name: &str, help: &str, labels: &[&str]| {
            GaugeVec::new(Opts::new(name, help).namespace(NAMESPACE), labels)
                .expect("valid pgpool2 backend metric opts")
        };

        Self {
            mapping,
            by_process_used: gauge(
                "backend_by_process_used",
                "Number of used backend connection slots per child process",
                &["pool_pid", "pool_id", "backend_id", "username", "database"],
            ),
            by_process_total: gauge(
                "backend_by_process_total",
                "Number of backend connection slots per child process",
                &["pool_pid"],
            ),
            by_process_used_ratio: gauge(
                "backend_by_process_used_ratio",
                "Ratio of used backend connection slots per child process",
                &["pool_pid"],
            ),
            backend_total: gauge(
                "backend_total",
                "Number of total possible backend connection slots",
                NO_LABELS,
            ),
            backend_used: gauge(
                "backend_used",
                "Number of used backend connection slots",
                NO_LABELS,
            ),
            backend_used_ratio: gauge(
                "backend_used_ratio",
                "Ratio of used backend connection slots to total slots",
                NO_LABELS,
            ),
        }
    }

    fn vecs(&self) -> [&GaugeVec; 6] {
        [
            &self.by_process_used,
            &self.by_process_total,
            &self.by_process_used_ratio,
            &self.backend_total,
            &self.backend_used,
            &self.backend_used_ratio,
        ]
    }

    /// Publishes the aggregate of `table`.
    pub fn apply(&self, table: &StatusTable) -> BackendSummary {
        let summary = aggregate(table);

        for (key, count) in &summary.by_slot {
            self.by_process_used
                .with_label_values(&[
                    key.pool_pid.as_str(),
                    key.pool_id.as_str(),
                    key.backend_id.as_str(),
                    key.username.as_str(),
                    key.database.as_str(),
                ])
                .set(usize_to_f64(*count));
        }

        for (pool_pid, slots) in &summary.by_process {
            self.by_process_total
                .with_label_values(&[pool_pid.as_str()])
                .set(usize_to_f64(slots.total));
            self.by_process_used_ratio
                .with_label_values(&[pool_pid.as_str()])
                .set(slots.used_ratio());
        }

        self.backend_total
            .with_label_values(NO_LABELS)
            .set(usize_to_f64(summary.total));
        self.backend_used
            .with_label_values(NO_LABELS)
            .set(usize_to_f64(summary.used));
        self.backend_used_ratio
            .with_label_values(NO_LABELS)
            .set(summary.used_ratio());

        summary
    }
}

impl Collector for PoolsCollector {
    fn name(&self) -> &'static str {
        self.mapping.table
    }

    fn since(&self) -> Option<&Version> {
        self.mapping.since.as_ref()
    }

    #[instrument(skip(self, registry), level = "info", err, fields(collector = "pools"))]
    fn register_metrics(&self, registry: &Registry) -> Result<()> {
        for vec in self.vecs() {
            registry.register(Box::new(vec.clone()))?;
        }
        Ok(())
    }

    fn reset(&self) {
        for vec in self.vecs() {
            vec.reset();
        }
    }

    fn collect<'a>(&'a self, backend: &'a dyn Backend) -> BoxFuture<'a, CollectResult> {
        Box::pin(async move {
            let table = fetch_table(backend, self.mapping.table).await?;

            let summary = self.apply(&table);
            debug!(
                total = summary.total,
                used = summary.used,
                processes = summary.by_process.len(),
                "aggregated backend connection slots"
            );

            Ok(Vec::new())
        })
    }
}
