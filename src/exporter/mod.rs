use crate::{
    cli::telemetry::shutdown_tracer,
    pgpool::{Connector, PgConnector, dsn::mask_password},
};
use anyhow::{Context, Result, anyhow, ensure};
use axum::{
    Extension, Router,
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::{Next, from_fn},
    response::Response,
    routing::get,
};
use opentelemetry::global;
use opentelemetry::trace::{TraceContextExt, TraceId};
use opentelemetry_http::HeaderExtractor;
use secrecy::{ExposeSecret, SecretString};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{Span, error, info, info_span};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use ulid::Ulid;

mod handlers;
mod shutdown;
pub mod state;

pub use state::{Exporter, ScrapeReport};

pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = if let Some(hash) = built_info::GIT_COMMIT_HASH {
    hash
} else {
    ":-("
};

pub async fn new(
    port: u16,
    listen: Option<String>,
    dsn: SecretString,
    metrics_path: String,
    retry_interval: Duration,
) -> Result<()> {
    ensure!(
        metrics_path.starts_with('/') && metrics_path != "/",
        "Invalid metrics path: '{metrics_path}'. Expected an absolute path other than '/'"
    );

    info!(dsn = %mask_password(dsn.expose_secret()), "connecting to Pgpool-II");

    let exporter = Arc::new(Exporter::connect(PgConnector::new(dsn), retry_interval).await?);

    let app = app(Arc::clone(&exporter), &metrics_path);

    let (listener, bind_addr) = bind(listen.as_deref(), port).await?;

    let version = exporter
        .server_version()
        .map_or_else(|| "unknown".to_string(), ToString::to_string);

    println!(
        "{} {} - Listening on {bind_addr}{metrics_path}\n\nPgpool-II version: {version}\n\nStatus tables:\n{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        format_list(&exporter.collectors().collector_names()),
    );

    if let Err(e) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown::shutdown_signal())
        .await
    {
        error!(error=%e, "server error");
    }

    info!("shutting down");

    shutdown_tracer();

    Ok(())
}

// An explicit address must be an IP. Without one, listen on [::] and fall
// back to 0.0.0.0 where IPv6 is unavailable.
async fn bind(listen: Option<&str>, port: u16) -> Result<(TcpListener, String)> {
    let Some(listen) = listen else {
        if let Ok(listener) = TcpListener::bind((Ipv6Addr::UNSPECIFIED, port)).await {
            return Ok((listener, format!("[::]:{port}")));
        }
        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .with_context(|| format!("Failed to bind to 0.0.0.0:{port}"))?;
        return Ok((listener, format!("0.0.0.0:{port}")));
    };

    let ip: IpAddr = listen.parse().map_err(|_| {
        anyhow!("Invalid listen address: '{listen}'. Expected an IPv4 or IPv6 address")
    })?;
    let addr = SocketAddr::new(ip, port);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    Ok((listener, addr.to_string()))
}

/// Routes of the exporter: `metrics_path`, `/health` and the `/` index page.
///
/// # Panics
///
/// Panics if `metrics_path` is not an absolute path or is `/`.
pub fn app<C: Connector>(exporter: Arc<Exporter<C>>, metrics_path: &str) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(make_span)
        .on_response(on_response);

    Router::new()
        .route("/", get(handlers::landing))
        .route(metrics_path, get(handlers::metrics::<C>))
        .route(
            "/health",
            get(handlers::health::<C>).options(handlers::health::<C>),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(trace_layer)
                .layer(from_fn(add_trace_headers))
                .layer(Extension(exporter))
                .layer(Extension(handlers::LandingPage::new(metrics_path))),
        )
}

// Indented bullet list for the start up banner
fn format_list<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| format!("  - {i}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn header<'a>(request: &'a Request<Body>, name: &str) -> Option<&'a str> {
    request.headers().get(name).and_then(|v| v.to_str().ok())
}

fn make_span(request: &Request<Body>) -> Span {
    let parent_cx =
        global::get_text_map_propagator(|prop| prop.extract(&HeaderExtractor(request.headers())));

    let span = info_span!(
        "http.server.request",
        otel.kind = "server",
        otel.status_code = tracing::field::Empty,
        http.method = request.method().as_str(),
        http.route = request.uri().path(),
        http.target = %request.uri(),
        http.scheme = request.uri().scheme_str().unwrap_or("http"),
        http.user_agent = header(request, "user-agent").unwrap_or("unknown"),
        request_id = header(request, "x-request-id").unwrap_or("none"),
    );

    let _ = span.set_parent(parent_cx);

    span
}

fn on_response<B>(response: &axum::http::Response<B>, latency: Duration, span: &Span) {
    let status = response.status();

    span.record(
        "otel.status_code",
        if status.is_server_error() { "ERROR" } else { "OK" },
    );

    let elapsed_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    let trace_id = span.context().span().span_context().trace_id();

    if trace_id == TraceId::INVALID {
        info!(parent: span, status = status.as_u16(), elapsed_ms, "request completed");
    } else {
        info!(
            parent: span,
            status = status.as_u16(),
            elapsed_ms,
            trace_id = %trace_id,
            "request completed"
        );
    }
}

async fn add_trace_headers(req: Request<Body>, next: Next) -> Response {
    let mut res = next.run(req).await;

    let cx = Span::current().context();
    let span_context = cx.span().span_context().clone();

    if span_context.is_valid()
        && let Ok(val) = HeaderValue::from_str(&span_context.trace_id().to_string())
    {
        res.headers_mut()
            .insert(HeaderName::from_static("x-trace-id"), val);
    }

    res
}
