//! Logging and distributed-tracing initialization.
//!
//! Mirrors the teacher's `acteon-server::telemetry` module: a plain `fmt`
//! subscriber always runs, and an OpenTelemetry OTLP layer is added on top
//! when `OTEL_EXPORTER_OTLP_ENDPOINT` is set (§6, §9 "Logging").

use opentelemetry::trace::TracerProvider;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::AppSection;

/// Opaque handle returned by [`init`]. Call [`TelemetryGuard::shutdown`] on
/// graceful shutdown to flush pending spans.
pub struct TelemetryGuard {
    provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    pub fn shutdown(mut self) {
        if let Some(provider) = self.provider.take()
            && let Err(e) = provider.shutdown()
        {
            tracing::warn!(error = %e, "tracer provider shutdown failed");
        }
    }
}

/// Initialize the tracing subscriber from `app.log_level`, adding an OTLP
/// exporter when `app.otel_exporter_otlp_endpoint` is set. Falls back to
/// fmt-only tracing if the exporter fails to build — telemetry
/// misconfiguration must never prevent the server from starting.
pub fn init(app: &AppSection) -> TelemetryGuard {
    let env_filter = tracing_subscriber::EnvFilter::try_new(&app.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer();

    let Some(endpoint) = app.otel_exporter_otlp_endpoint.as_ref().filter(|e| !e.is_empty()) else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
        return TelemetryGuard { provider: None };
    };

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build();

    let exporter = match exporter {
        Ok(exporter) => exporter,
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .init();
            tracing::error!(error = %e, %endpoint, "failed to build OTLP exporter, falling back to fmt-only tracing");
            return TelemetryGuard { provider: None };
        }
    };

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", "limitforge-server"),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();

    global::set_tracer_provider(provider.clone());
    let tracer = provider.tracer("limitforge");
    let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    info!(%endpoint, "OpenTelemetry tracing enabled");

    TelemetryGuard {
        provider: Some(provider),
    }
}
