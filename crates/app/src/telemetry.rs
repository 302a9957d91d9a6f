use std::{
    fmt,
    sync::{Mutex, OnceLock},
    time::Instant,
};

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{
    BuildError as PrometheusBuildError, PrometheusBuilder, PrometheusHandle,
};
use tracing_subscriber::{
    fmt::{self as tracing_fmt, time::UtcTime},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter,
};

use customer_registry_util::AppConfig;

#[derive(Debug)]
pub enum TelemetryError {
    Tracing(TryInitError),
    Metrics(PrometheusBuildError),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tracing(err) => write!(f, "failed to initialize tracing: {err}"),
            Self::Metrics(err) => write!(f, "failed to initialize prometheus recorder: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {}

impl From<TryInitError> for TelemetryError {
    fn from(value: TryInitError) -> Self {
        Self::Tracing(value)
    }
}

impl From<PrometheusBuildError> for TelemetryError {
    fn from(value: PrometheusBuildError) -> Self {
        Self::Metrics(value)
    }
}

static TRACING_INIT: OnceLock<()> = OnceLock::new();
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static METRICS_INSTALL_GUARD: Mutex<()> = Mutex::new(());
static START_TIME: OnceLock<Instant> = OnceLock::new();

const BUILD_VERSION: &str = env!("CARGO_PKG_VERSION");

fn build_git_sha() -> &'static str {
    option_env!("GIT_SHA").unwrap_or("unknown")
}

/// Installs the global tracing subscriber.
///
/// Production emits JSON lines; every other environment gets the pretty
/// formatter. Filtering follows `RUST_LOG` and defaults to `info`.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryError> {
    if TRACING_INIT.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let base = tracing_fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_timer(UtcTime::rfc_3339());

    let registry = tracing_subscriber::registry().with(env_filter);
    if config.environment.is_production() {
        registry.with(base.json()).try_init()?;
    } else {
        registry
            .with(base.event_format(
                tracing_fmt::format()
                    .pretty()
                    .with_timer(UtcTime::rfc_3339()),
            ))
            .try_init()?;
    }

    TRACING_INIT.set(()).ok();
    tracing::info!(
        stage = "telemetry",
        env = %config.environment.as_str(),
        version = BUILD_VERSION,
        git_sha = build_git_sha(),
        "tracing initialized"
    );
    Ok(())
}

/// Installs the Prometheus recorder once per process and returns its handle.
pub fn init_metrics() -> Result<PrometheusHandle, TelemetryError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let _guard = METRICS_INSTALL_GUARD
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    METRICS_HANDLE.set(handle.clone()).ok();

    describe_gauge!("app_build_info", "Build metadata for the running binary");
    describe_gauge!("app_uptime_seconds", "Seconds since the process started");
    describe_counter!(
        "customer_registrations_total",
        "Count of customer registration requests, labelled by result"
    );
    describe_histogram!(
        "registration_latency_seconds",
        "Latency in seconds to answer customer registration requests, labelled by result"
    );
    START_TIME.get_or_init(Instant::now);

    Ok(handle)
}

/// Renders the recorder output plus the synthesized build and uptime gauges.
pub fn render_metrics(handle: &PrometheusHandle) -> String {
    let mut body = handle.render();
    if !body.is_empty() && !body.ends_with('\n') {
        body.push('\n');
    }

    let uptime = START_TIME
        .get()
        .map(|start| start.elapsed().as_secs_f64())
        .unwrap_or_default();

    body.push_str(&format!(
        "# TYPE app_build_info gauge\n\
         app_build_info{{version=\"{BUILD_VERSION}\",git=\"{}\"}} 1\n\
         # TYPE app_uptime_seconds gauge\n\
         app_uptime_seconds {uptime}\n",
        build_git_sha()
    ));

    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::counter;

    #[test]
    fn init_metrics_is_idempotent() {
        init_metrics().expect("metrics init");
        init_metrics().expect("second init reuses the installed recorder");
        assert!(METRICS_HANDLE.get().is_some());
        assert!(START_TIME.get().is_some());
    }

    #[test]
    fn rendered_output_includes_registration_counter() {
        let handle = init_metrics().expect("metrics init");
        counter!("customer_registrations_total", "result" => "telemetry_test").increment(1);

        let body = render_metrics(&handle);
        assert!(body.contains("customer_registrations_total"));
        assert!(body.contains(&format!("version=\"{BUILD_VERSION}\"")));
        assert!(body.ends_with('\n'));
    }
}
