use crate::cli::actions::Action;
use crate::exporter::new;
use anyhow::Result;

/// Handle the run action
///
/// # Errors
///
/// Returns an error if the exporter cannot start serving
pub async fn handle(action: Action) -> Result<()> {
    match action {
        Action::Run {
            port,
            listen,
            dsn,
            metrics_path,
            connect_retry_interval,
        } => {
            new(port, listen, dsn, metrics_path, connect_retry_interval).await?;
        }
    }

    Ok(())
}
