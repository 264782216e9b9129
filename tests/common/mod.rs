#![allow(dead_code)]

use anyhow::Result;
use futures::future::BoxFuture;
use pgpool2_exporter::exporter::Exporter;
use pgpool2_exporter::pgpool::{
    Backend, ConnectionError, ConnectionManager, Connector, RawRow, StatusTable,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Everything the fake Pgpool-II answers, shared by the connector and its
/// connections.
#[derive(Default)]
struct Script {
    tables: HashMap<String, StatusTable>,
    failing: HashSet<String>,
    hanging: HashSet<String>,
    refuse_connections: bool,
    dead: HashSet<u64>,
    next_id: u64,
    /// `(connection id, table)` for every `SHOW` issued.
    shows: Vec<(u64, String)>,
    closed: Vec<u64>,
}

/// In-memory stand-in for a Pgpool-II server.
#[derive(Clone, Default)]
pub struct FakePgpool {
    script: Arc<Mutex<Script>>,
}

impl FakePgpool {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Answer `SHOW <table>` with these rows.
    pub fn with_table(self, table: &str, rows: Vec<RawRow>) -> Self {
        self.set_table(table, rows);
        self
    }

    pub fn with_version(self, version: &str) -> Self {
        self.with_table("pool_version", vec![row(&[("pool_version", version)])])
    }

    pub fn set_table(&self, table: &str, rows: Vec<RawRow>) {
        self.script()
            .tables
            .insert(table.to_string(), StatusTable::from_rows(rows));
    }

    /// Make `SHOW <table>` fail.
    pub fn fail_table(&self, table: &str) {
        self.script().failing.insert(table.to_string());
    }

    /// Make `SHOW <table>` never answer.
    pub fn hang_table(&self, table: &str) {
        self.script().hanging.insert(table.to_string());
    }

    /// Make every open connection fail its probe.
    pub fn kill_connections(&self) {
        let mut script = self.script();
        let ids: Vec<u64> = (0..script.next_id).collect();
        script.dead.extend(ids);
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.script().refuse_connections = refuse;
    }

    pub fn connections(&self) -> u64 {
        self.script().next_id
    }

    pub fn closed(&self) -> Vec<u64> {
        self.script().closed.clone()
    }

    /// Tables queried on connection `id`.
    pub fn shows_on(&self, id: u64) -> Vec<String> {
        self.script()
            .shows
            .iter()
            .filter(|(conn, _)| *conn == id)
            .map(|(_, table)| table.clone())
            .collect()
    }

    pub fn clear_shows(&self) {
        self.script().shows.clear();
    }
}

pub struct FakeBackend {
    id: u64,
    pgpool: FakePgpool,
}

impl Backend for FakeBackend {
    fn probe(&self) -> BoxFuture<'_, Result<(), ConnectionError>> {
        Box::pin(async move {
            if self.pgpool.script().dead.contains(&self.id) {
                Err(ConnectionError::Probe(sqlx::Error::Protocol(
                    "server closed the connection unexpectedly".to_string(),
                )))
            } else {
                Ok(())
            }
        })
    }

    fn show<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<StatusTable, sqlx::Error>> {
        Box::pin(async move {
            let answer = {
                let mut script = self.pgpool.script();
                script.shows.push((self.id, table.to_string()));

                if script.hanging.contains(table) {
                    None
                } else if script.failing.contains(table) {
                    Some(Err(sqlx::Error::Protocol(format!("SHOW {table} failed"))))
                } else {
                    Some(script.tables.get(table).cloned().ok_or_else(|| {
                        sqlx::Error::Protocol(format!("invalid config parameter \"{table}\""))
                    }))
                }
            };

            match answer {
                Some(answer) => answer,
                None => futures::future::pending().await,
            }
        })
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.pgpool.script().closed.push(self.id);
        })
    }
}

impl Connector for FakePgpool {
    type Backend = FakeBackend;

    fn connect(&self) -> BoxFuture<'_, Result<FakeBackend, ConnectionError>> {
        Box::pin(async move {
            let mut script = self.script();
            if script.refuse_connections {
                return Err(ConnectionError::Connect(sqlx::Error::Protocol(
                    "connection refused".to_string(),
                )));
            }

            let id = script.next_id;
            script.next_id += 1;

            Ok(FakeBackend {
                id,
                pgpool: self.clone(),
            })
        })
    }
}

pub fn row(cells: &[(&str, &str)]) -> RawRow {
    cells.iter().map(|(k, v)| (*k, *v)).collect()
}

pub fn pool_nodes() -> Vec<RawRow> {
    vec![
        row(&[
            ("node_id", "0"),
            ("hostname", "pg0"),
            ("port", "5432"),
            ("status", "up"),
            ("role", "primary"),
            ("select_cnt", "12"),
            ("replication_delay", "0"),
        ]),
        row(&[
            ("node_id", "1"),
            ("hostname", "pg1"),
            ("port", "5432"),
            ("status", "down"),
            ("role", "standby"),
            ("select_cnt", "3"),
            ("replication_delay", "128"),
        ]),
    ]
}

pub fn pool_processes() -> Vec<RawRow> {
    vec![
        row(&[("pool_pid", "100"), ("database", "app"), ("username", "alice")]),
        row(&[("pool_pid", "101"), ("database", "app"), ("username", "alice")]),
        row(&[("pool_pid", "102"), ("database", ""), ("username", "")]),
    ]
}

/// Connects the exporter to `pgpool`, detecting its version.
pub async fn exporter(pgpool: &FakePgpool) -> Result<Exporter<FakePgpool>> {
    Exporter::connect(pgpool.clone(), Duration::from_millis(10)).await
}

/// Exporter with a fixed version, skipping detection.
pub async fn exporter_with_version(
    pgpool: &FakePgpool,
    version: Option<semver::Version>,
) -> Result<Exporter<FakePgpool>> {
    let manager = ConnectionManager::establish(pgpool.clone(), Duration::from_millis(10)).await;
    Exporter::with_manager(manager, version)
}

/// Value of the sample line `series` in the text exposition, e.g.
/// `pgpool2_up` or `pgpool2_pool_nodes_status{hostname="pg0",port="5432",role="primary"}`.
pub fn sample(text: &str, series: &str) -> Option<f64> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (name, value) = line.rsplit_once(' ')?;
            (name == series).then(|| value.parse().ok()).flatten()
        })
}

pub fn pool_pools() -> Vec<RawRow> {
    vec![
        row(&[
            ("pool_pid", "100"),
            ("pool_id", "0"),
            ("backend_id", "0"),
            ("database", "app"),
            ("username", "alice"),
        ]),
        row(&[
            ("pool_pid", "100"),
            ("pool_id", "1"),
            ("backend_id", "0"),
            ("database", ""),
            ("username", ""),
        ]),
    ]
}

pub fn pool_cache() -> Vec<RawRow> {
    vec![row(&[
        ("num_cache_hits", "0"),
        ("num_selects", "0"),
        ("cache_hit_ratio", "0.00"),
        ("num_hash_entries", "1048576"),
        ("used_hash_entries", "0"),
        ("num_cache_entries", "0"),
        ("used_cache_entries_size", "0"),
        ("free_cache_entries_size", "67108864"),
        ("fragment_cache_entries_size", "0"),
    ])]
}

pub fn pool_backend_stats() -> Vec<RawRow> {
    vec![row(&[
        ("node_id", "0"),
        ("hostname", "pg0"),
        ("port", "5432"),
        ("status", "up"),
        ("role", "primary"),
        ("select_cnt", "12"),
        ("insert_cnt", "4"),
        ("update_cnt", "2"),
        ("delete_cnt", "1"),
        ("ddl_cnt", "0"),
        ("other_cnt", "7"),
        ("panic_cnt", "0"),
        ("fatal_cnt", "0"),
        ("error_cnt", "1"),
    ])]
}

pub fn pool_health_check_stats() -> Vec<RawRow> {
    vec![row(&[
        ("node_id", "0"),
        ("hostname", "pg0"),
        ("port", "5432"),
        ("status", "up"),
        ("role", "primary"),
        ("last_status_change", "2024-01-01 00:00:00"),
        ("total_count", "10"),
        ("success_count", "9"),
        ("fail_count", "1"),
        ("skip_count", "0"),
        ("retry_count", "2"),
        ("average_retry_count", "0.200000"),
        ("max_retry_count", "1"),
        ("max_duration", "15"),
        ("min_duration", "1"),
        ("average_duration", "3.500000"),
        ("last_health_check", "2024-01-01 00:01:00"),
        ("last_successful_health_check", "2024-01-01 00:01:00"),
        ("last_skip_health_check", ""),
        ("last_failed_health_check", ""),
    ])]
}

/// A Pgpool-II answering every exported table.
pub fn healthy_pgpool(version: &str) -> FakePgpool {
    FakePgpool::new()
        .with_version(version)
        .with_table("pool_nodes", pool_nodes())
        .with_table("pool_backend_stats", pool_backend_stats())
        .with_table("pool_health_check_stats", pool_health_check_stats())
        .with_table("pool_processes", pool_processes())
        .with_table("pool_pools", pool_pools())
        .with_table("pool_cache", pool_cache())
}
