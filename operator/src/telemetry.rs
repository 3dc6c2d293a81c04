use opentelemetry::trace::{TraceContextExt, TraceId};
use tracing_opentelemetry::OpenTelemetrySpanExt;

/// Fetch the opentelemetry trace id of the current span
///
/// `TraceId::INVALID` when no opentelemetry layer is installed.
pub fn get_trace_id() -> TraceId {
    tracing::Span::current()
        .context()
        .span()
        .span_context()
        .trace_id()
}

/// Batch exporter of spans to the OTLP collector at `OPENTELEMETRY_ENDPOINT_URL`
#[cfg(feature = "telemetry")]
pub fn init_tracer() -> crate::Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{Resource, runtime, trace};

    let endpoint =
        std::env::var("OPENTELEMETRY_ENDPOINT_URL").unwrap_or_else(|_| "http://localhost:4317".to_string());
    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().tonic().with_endpoint(endpoint))
        .with_trace_config(trace::Config::default().with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            "jiraservicedesk-operator",
        )])))
        .install_batch(runtime::Tokio)
        .map_err(|e| crate::Error::Startup(format!("can not start the otlp exporter: {e}")))
}
