//! Prometheus exporter for Pgpool-II.
//!
//! Scrapes the `SHOW pool_*` commands of a Pgpool-II instance on every
//! request and publishes the results in the Prometheus text format.

pub mod cli;
pub mod collectors;
pub mod exporter;
pub mod pgpool;
