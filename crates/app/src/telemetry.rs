use std::sync::{Mutex, OnceLock, PoisonError};
use std::time::Instant;

use metrics::{describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;
use tracing_subscriber::{
    fmt::time::UtcTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use catalog_admin_util::{AppConfig, Environment};

pub const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to initialize tracing: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),
    #[error("failed to initialize prometheus recorder: {0}")]
    Metrics(#[from] BuildError),
}

static TRACING_INIT: OnceLock<()> = OnceLock::new();
static RECORDER: Mutex<Option<PrometheusHandle>> = Mutex::new(None);
static STARTED_AT: OnceLock<Instant> = OnceLock::new();

fn build_git_sha() -> &'static str {
    option_env!("GIT_SHA").unwrap_or("unknown")
}

/// Installs the global subscriber: human readable outside production, JSON lines in production.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryError> {
    if TRACING_INIT.get().is_some() {
        return Ok(());
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_timer(UtcTime::rfc_3339());
    let registry = tracing_subscriber::registry().with(filter);

    match config.environment {
        Environment::Production => registry.with(layer.json()).try_init()?,
        Environment::Development | Environment::Test => registry.with(layer.pretty()).try_init()?,
    }

    TRACING_INIT.set(()).ok();
    tracing::info!(
        stage = "app",
        env = %config.environment.as_str(),
        version = BUILD_VERSION,
        git_sha = build_git_sha(),
        "tracing initialized"
    );
    Ok(())
}

/// Installs the Prometheus recorder once per process and hands out its handle.
pub fn init_metrics() -> Result<PrometheusHandle, TelemetryError> {
    let mut recorder = RECORDER.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(handle) = recorder.as_ref() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    gauge!("app_build_info", "version" => BUILD_VERSION, "git" => build_git_sha()).set(1.0);
    STARTED_AT.get_or_init(Instant::now);

    *recorder = Some(handle.clone());
    Ok(handle)
}

fn describe_metrics() {
    describe_gauge!("app_build_info", "Build metadata for the running binary");
    describe_gauge!("app_uptime_seconds", "Seconds since the process started");
    describe_counter!(
        "auth_refresh_total",
        "Count of token refresh attempts, labelled by result"
    );
    describe_counter!(
        "auth_forced_logout_total",
        "Count of sessions torn down, labelled by reason"
    );
    describe_counter!(
        "http_requests_total",
        "Count of catalog API responses, labelled by status class"
    );
    describe_counter!(
        "category_mutations_total",
        "Count of category writes sent to the catalog API, labelled by kind and result"
    );
}

pub fn render_metrics(handle: &PrometheusHandle) -> String {
    if let Some(started) = STARTED_AT.get() {
        gauge!("app_uptime_seconds").set(started.elapsed().as_secs_f64());
    }
    handle.render()
}
