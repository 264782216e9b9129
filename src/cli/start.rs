use crate::cli::{actions::Action, commands, dispatch::handler, telemetry};
use anyhow::Result;
use tracing::Level;

// -v INFO, -vv DEBUG, anything above TRACE; None leaves the ERROR default
const fn verbosity(count: u8) -> Option<Level> {
    match count {
        0 => None,
        1 => Some(Level::INFO),
        2 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

/// Parse the command line, install logging and build the [`Action`] to run.
///
/// # Errors
///
/// Returns an error if telemetry cannot be installed or no DSN is available
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    telemetry::init(verbosity(matches.get_count("verbose")))?;

    handler(&matches)
}
