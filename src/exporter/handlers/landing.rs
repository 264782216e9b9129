use axum::{extract::Extension, response::Html};
use std::sync::Arc;

/// The index page, rendered once at startup.
#[derive(Clone)]
pub struct LandingPage(Arc<str>);

impl LandingPage {
    #[must_use]
    pub fn new(metrics_path: &str) -> Self {
        Self(Arc::from(format!(
            "<html>\n\
             <head><title>Pgpool-II Exporter</title></head>\n\
             <body>\n\
             <h1>Pgpool-II Exporter</h1>\n\
             <p><a href='{metrics_path}'>Metrics</a></p>\n\
             </body>\n\
             </html>\n"
        )))
    }
}

pub async fn landing(Extension(page): Extension<LandingPage>) -> Html<String> {
    Html(page.0.to_string())
}
