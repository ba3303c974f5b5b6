//! Tracing subscriber setup for binaries built on the recall crates.
//!
//! Call [`init_tracing`] once at startup and keep the returned guard alive.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter (default `"info"`). |
//! | `RECALL_LOG_FORMAT=json` | Newline-delimited JSON logs instead of the compact format. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | OTLP/HTTP collector URL; spans are exported when set. |
//!
//! ```rust,no_run
//! let _guard = recall_context::telemetry::init_tracing("recall");
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

pub const LOG_FORMAT_ENV: &str = "RECALL_LOG_FORMAT";
pub const OTLP_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; anything else is compact.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }

    pub fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }
}

/// Install the global subscriber, with an OTLP span exporter when
/// `OTEL_EXPORTER_OTLP_ENDPOINT` is set.
///
/// Dropping the returned guard flushes pending spans.
pub fn init_tracing(service_name: &str) -> TracerProviderGuard {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let provider = build_provider(service_name);

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer().compact().boxed(),
    };
    let otel_layer = provider
        .as_ref()
        .map(|p| tracing_opentelemetry::layer().with_tracer(p.tracer("recall")));

    // A second call is a no-op.
    let _ = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(otel_layer)
        .with(env_filter)
        .try_init();

    TracerProviderGuard(provider)
}

/// Shuts the OpenTelemetry provider down on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("[recall] OpenTelemetry provider shutdown error: {e}");
            }
        }
    }
}

fn build_provider(service_name: &str) -> Option<SdkTracerProvider> {
    let endpoint = std::env::var(OTLP_ENDPOINT_ENV).ok()?;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[recall] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    // Simple exporter: no async runtime is running in the CLI.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::parse(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("JSON")), LogFormat::Json);
        assert_eq!(LogFormat::parse(Some("pretty")), LogFormat::Compact);
        assert_eq!(LogFormat::parse(None), LogFormat::Compact);
    }

    #[test]
    fn no_provider_without_endpoint() {
        // SAFETY: no other test in this crate touches this variable.
        unsafe { std::env::remove_var(OTLP_ENDPOINT_ENV) };
        assert!(build_provider("test-service").is_none());
    }

    #[test]
    fn empty_guard_drops_cleanly() {
        drop(TracerProviderGuard(None));
    }
}
