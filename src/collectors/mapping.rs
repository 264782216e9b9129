//! Static description of the Pgpool-II status tables we export.
//!
//! Each column is tagged with how it takes part in metric emission. The table
//! is compiled into Prometheus descriptors once, see
//! [`compile`](super::descriptor::compile).

use crate::pgpool::version::VERSION_4_2;
use semver::Version;
use ColumnUsage::{Discard, Gauge, Label};

/// How a result column is turned into metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnUsage {
    /// Ignore this column.
    Discard,
    /// Use this column as a label.
    Label,
    /// Use this column as a counter.
    Counter,
    /// Use this column as a gauge.
    Gauge,
    /// Text column mapped to numbers through a fixed table (no table uses it yet).
    MappedMetric,
    /// Text duration converted to milliseconds (no table uses it yet).
    Duration,
}

/// One column of a status table.
#[derive(Clone, Copy, Debug)]
pub struct ColumnMapping {
    pub column: &'static str,
    pub usage: ColumnUsage,
    pub description: &'static str,
}

/// How the rows of a status table become samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableKind {
    /// One sample per (row, metric column).
    Namespace,
    /// Frontend slot counts aggregated from `SHOW pool_processes`.
    Processes,
    /// Backend slot counts aggregated from `SHOW pool_pools`.
    Pools,
}

/// A status table reachable through `SHOW <table>`.
#[derive(Debug)]
pub struct TableMapping {
    pub table: &'static str,
    pub kind: TableKind,
    /// First Pgpool-II release exposing the table; `None` means all releases.
    pub since: Option<Version>,
    pub columns: &'static [ColumnMapping],
}

impl TableMapping {
    /// Label columns, in declaration order.
    pub fn labels(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns
            .iter()
            .filter(|c| c.usage == ColumnUsage::Label)
            .map(|c| c.column)
    }
}

const fn col(column: &'static str, usage: ColumnUsage, description: &'static str) -> ColumnMapping {
    ColumnMapping {
        column,
        usage,
        description,
    }
}

const STATUS_HELP: &str = "Backend node Status (1 for up or waiting, 0 for down or unused)";

pub static METRIC_MAPS: &[TableMapping] = &[
    TableMapping {
        table: "pool_nodes",
        kind: TableKind::Namespace,
        since: None,
        columns: &[
            col("hostname", Label, "Backend hostname"),
            col("port", Label, "Backend port"),
            col("role", Label, "Role (primary or standby)"),
            col("status", Gauge, STATUS_HELP),
            col("select_cnt", Gauge, "SELECT statement counts issued to each backend"),
            col("replication_delay", Gauge, "Replication delay"),
        ],
    },
    TableMapping {
        table: "pool_backend_stats",
        kind: TableKind::Namespace,
        since: Some(VERSION_4_2),
        columns: &[
            col("hostname", Label, "Backend hostname"),
            col("port", Label, "Backend port"),
            col("role", Label, "Role (primary or standby)"),
            col("status", Gauge, STATUS_HELP),
            col("select_cnt", Gauge, "SELECT statement counts issued to each backend"),
            col("insert_cnt", Gauge, "INSERT statement counts issued to each backend"),
            col("update_cnt", Gauge, "UPDATE statement counts issued to each backend"),
            col("delete_cnt", Gauge, "DELETE statement counts issued to each backend"),
            col("ddl_cnt", Gauge, "DDL statement counts issued to each backend"),
            col("other_cnt", Gauge, "other statement counts issued to each backend"),
            col("panic_cnt", Gauge, "Panic message counts returned from backend"),
            col("fatal_cnt", Gauge, "Fatal message counts returned from backend"),
            col("error_cnt", Gauge, "Error message counts returned from backend"),
        ],
    },
    TableMapping {
        table: "pool_health_check_stats",
        kind: TableKind::Namespace,
        since: Some(VERSION_4_2),
        columns: &[
            col("hostname", Label, "Backend hostname"),
            col("port", Label, "Backend port"),
            col("role", Label, "Role (primary or standby)"),
            col("status", Gauge, STATUS_HELP),
            col("total_count", Gauge, "Number of health check count in total"),
            col("success_count", Gauge, "Number of successful health check count in total"),
            col("fail_count", Gauge, "Number of failed health check count in total"),
            col("skip_count", Gauge, "Number of skipped health check count in total"),
            col("retry_count", Gauge, "Number of retried health check count in total"),
            col(
                "average_retry_count",
                Gauge,
                "Number of average retried health check count in a health check session",
            ),
            col(
                "max_retry_count",
                Gauge,
                "Number of maximum retried health check count in a health check session",
            ),
            col("max_duration", Gauge, "Maximum health check duration in milliseconds"),
            col("min_duration", Gauge, "Minimum health check duration in milliseconds"),
            col("average_duration", Gauge, "Average health check duration in milliseconds"),
        ],
    },
    TableMapping {
        table: "pool_processes",
        kind: TableKind::Processes,
        since: None,
        columns: &[
            col("pool_pid", Discard, "PID of Pgpool-II child processes"),
            col(
                "database",
                Discard,
                "Database name of the currently active backend connection",
            ),
            col(
                "username",
                Discard,
                "User name of the currently active backend connection",
            ),
        ],
    },
    TableMapping {
        table: "pool_pools",
        kind: TableKind::Pools,
        since: None,
        columns: &[
            col("pool_pid", Discard, "PID of Pgpool-II child processes"),
            col("pool_id", Discard, "Pool identifier"),
            col("backend_id", Discard, "Backend identifier"),
            col("database", Discard, "Database name of this connection"),
            col("username", Discard, "User name of this connection"),
        ],
    },
    TableMapping {
        table: "pool_cache",
        kind: TableKind::Namespace,
        since: None,
        columns: &[
            col("cache_hit_ratio", Gauge, "Query cache hit ratio"),
            col("num_hash_entries", Gauge, "Number of total hash entries"),
            col("used_hash_entries", Gauge, "Number of used hash entries"),
            col("num_cache_entries", Gauge, "Number of used cache entries"),
            col("used_cache_entries_size", Gauge, "Total size of used cache size"),
            col("free_cache_entries_size", Gauge, "Total size of free cache size"),
        ],
    },
];
