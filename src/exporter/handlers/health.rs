use crate::exporter::{Exporter, GIT_COMMIT_HASH};
use crate::pgpool::Connector;
use axum::{
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

impl Health {
    fn new(pgpool_ok: bool) -> Self {
        Self {
            commit: GIT_COMMIT_HASH.to_string(),
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database: if pgpool_ok { "ok" } else { "error" }.to_string(),
        }
    }

    // name:version:short-hash
    fn x_app(&self) -> Option<HeaderValue> {
        let short_hash = self.commit.get(..7).unwrap_or_default();
        HeaderValue::from_str(&format!("{}:{}:{short_hash}", self.name, self.version))
            .inspect_err(|e| debug!("Failed to build X-App header: {e}"))
            .ok()
    }
}

/// Reports whether the current Pgpool-II connection answers its probe. Never
/// reconnects; that is left to the next scrape.
pub async fn health<C: Connector>(
    method: Method,
    Extension(exporter): Extension<Arc<Exporter<C>>>,
) -> Response {
    let status = match exporter.health_check().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            error!("Failed to ping Pgpool-II: {e}");
            StatusCode::SERVICE_UNAVAILABLE
        }
    };

    let health = Health::new(status.is_success());

    let mut headers = HeaderMap::new();
    if let Some(x_app) = health.x_app() {
        headers.insert("X-App", x_app);
    }

    if method == Method::GET {
        (status, headers, Json(health)).into_response()
    } else {
        (status, headers).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_reports_pgpool_state() {
        assert_eq!(Health::new(true).database, "ok");
        assert_eq!(Health::new(false).database, "error");
    }

    #[test]
    fn test_x_app_uses_short_hash() {
        let health = Health {
            commit: "0123456789abcdef".to_string(),
            name: "pgpool2_exporter".to_string(),
            version: "0.1.0".to_string(),
            database: "ok".to_string(),
        };
        assert_eq!(
            health.x_app().as_ref().and_then(|v| v.to_str().ok()),
            Some("pgpool2_exporter:0.1.0:0123456")
        );
    }

    #[test]
    fn test_x_app_without_commit() {
        let health = Health {
            commit: ":-(".to_string(),
            name: "pgpool2_exporter".to_string(),
            version: "0.1.0".to_string(),
            database: "ok".to_string(),
        };
        assert_eq!(
            health.x_app().as_ref().and_then(|v| v.to_str().ok()),
            Some("pgpool2_exporter:0.1.0:")
        );
    }
}
