use super::NAMESPACE;
use anyhow::Result;
use prometheus::{Gauge, IntCounter, Opts, Registry};
use std::time::Instant;

/// The four scrape-health metrics of the exporter.
///
/// - `pgpool2_up`: 1 when the last probe (after at most one reconnect) succeeded
/// - `pgpool2_last_scrape_duration_seconds`: wall time of the last scrape
/// - `pgpool2_scrapes_total`: scrapes attempted since start
/// - `pgpool2_last_scrape_error`: 1 when the last scrape hit a connection or
///   table error
///
/// Durations are recorded by [`ScrapeTimer`], an RAII guard returned from
/// [`ScrapeHealth::start_scrape`]:
///
/// ```no_run
/// # use pgpool2_exporter::collectors::ScrapeHealth;
/// let health = ScrapeHealth::new();
/// {
///     let _timer = health.start_scrape();
///     // probe, query every table...
/// } // duration recorded here
/// ```
#[derive(Clone)]
pub struct ScrapeHealth {
    up: Gauge,
    duration: Gauge,
    scrapes_total: IntCounter,
    error: Gauge,
}

impl Default for ScrapeHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl ScrapeHealth {
    /// Creates a new `ScrapeHealth`
    ///
    /// # Panics
    ///
    /// Panics if metric creation fails (should never happen with valid metric names)
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new() -> Self {
        let up = Gauge::with_opts(
            Opts::new(
                "up",
                "Whether the Pgpool-II server is up (1 for yes, 0 for no).",
            )
            .namespace(NAMESPACE),
        )
        .expect("pgpool2_up");

        let duration = Gauge::with_opts(
            Opts::new(
                "last_scrape_duration_seconds",
                "Duration of the last scrape of metrics from Pgpool-II.",
            )
            .namespace(NAMESPACE),
        )
        .expect("pgpool2_last_scrape_duration_seconds");

        let scrapes_total = IntCounter::with_opts(
            Opts::new(
                "scrapes_total",
                "Total number of times Pgpool-II has been scraped for metrics.",
            )
            .namespace(NAMESPACE),
        )
        .expect("pgpool2_scrapes_total");

        let error = Gauge::with_opts(
            Opts::new(
                "last_scrape_error",
                "Whether the last scrape of metrics from Pgpool-II resulted in an error (1 for error, 0 for success).",
            )
            .namespace(NAMESPACE),
        )
        .expect("pgpool2_last_scrape_error");

        Self {
            up,
            duration,
            scrapes_total,
            error,
        }
    }

    /// Counts a new scrape and starts timing it.
    #[must_use]
    pub fn start_scrape(&self) -> ScrapeTimer {
        self.scrapes_total.inc();
        ScrapeTimer {
            start: Instant::now(),
            duration: self.duration.clone(),
        }
    }

    pub fn set_up(&self, up: bool) {
        self.up.set(if up { 1.0 } else { 0.0 });
    }

    pub fn set_error(&self, error: bool) {
        self.error.set(if error { 1.0 } else { 0.0 });
    }

    #[must_use]
    pub fn is_up(&self) -> bool {
        self.up.get() > 0.0
    }

    #[must_use]
    pub fn scrapes(&self) -> u64 {
        self.scrapes_total.get()
    }

    /// Register all metrics with the registry
    ///
    /// # Errors
    ///
    /// Returns an error if any metric fails to register
    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.up.clone()))?;
        registry.register(Box::new(self.duration.clone()))?;
        registry.register(Box::new(self.scrapes_total.clone()))?;
        registry.register(Box::new(self.error.clone()))?;
        Ok(())
    }
}

/// RAII timer for the scrape duration
///
/// Records the elapsed time on drop, whatever the outcome of the scrape.
pub struct ScrapeTimer {
    start: Instant,
    duration: Gauge,
}

impl Drop for ScrapeTimer {
    fn drop(&mut self) {
        self.duration.set(self.start.elapsed().as_secs_f64());
    }
}
