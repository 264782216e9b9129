use crate::{cli::actions::Action, pgpool::dsn};
use anyhow::{Context, Result, anyhow};
use clap::ArgMatches;
use secrecy::SecretString;
use std::time::Duration;

/// Turns the parsed command line into an [`Action`].
///
/// # Errors
///
/// Returns an error if no connection string can be built
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    // Get the port or return an error
    let port = matches
        .get_one::<u16>("port")
        .copied()
        .ok_or_else(|| anyhow!("Port is required. Please provide it using the --port flag."))?;

    // Get the listen address (None means auto-detect)
    let listen = matches.get_one::<String>("listen").cloned();

    let metrics_path = matches
        .get_one::<String>("metrics-path")
        .cloned()
        .unwrap_or_else(|| "/metrics".to_string());

    let connect_retry_interval = Duration::from_secs(
        matches
            .get_one::<u64>("connect-retry-interval")
            .copied()
            .unwrap_or(5),
    );

    Ok(Action::Run {
        port,
        listen,
        dsn: get_dsn(matches)?,
        metrics_path,
        connect_retry_interval,
    })
}

/// `--dsn` as given, otherwise composed from `--dsn-user`, `--dsn-pass` and `--dsn-uri`.
///
/// # Errors
///
/// Returns an error if neither form is available or the URI is invalid
pub fn get_dsn(matches: &ArgMatches) -> Result<SecretString> {
    if let Some(dsn) = matches.get_one::<String>("dsn").filter(|s| !s.is_empty()) {
        return Ok(SecretString::from(dsn.clone()));
    }

    let part = |name: &str| {
        matches
            .get_one::<String>(name)
            .map(String::as_str)
            .unwrap_or_default()
    };

    let (user, pass, uri) = (part("dsn-user"), part("dsn-pass"), part("dsn-uri"));

    if uri.is_empty() {
        return Err(anyhow!(
            "DSN is required. Please provide it using --dsn (DATA_SOURCE_NAME) or --dsn-uri (DATA_SOURCE_URI)."
        ));
    }

    dsn::compose(user, pass, uri).with_context(|| format!("Invalid DATA_SOURCE_URI: '{uri}'"))
}
