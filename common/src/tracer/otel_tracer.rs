use opentelemetry::{KeyValue, trace::TraceError};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::Tracer};
use tracing::{level_filters::LevelFilter, warn};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{EnvFilter, Layer, filter::Filtered, registry::LookupSpan};

/// Environment variable holding the filter directives for spans sent to the collector.
const OTEL_LEVEL_ENV: &str = "OTEL_LEVEL";

pub struct OtelOptions<'a> {
    /// URL of the OpenTelemetry collector.
    pub endpoint: &'a str,
    /// Emitted as the "service.namespace" resource, distinguishes parallel deployments.
    pub namespace: String,
}

/// Holds the OpenTelemetry layer to be added to the global subscriber.
pub struct OtelTracer<S> {
    pub(super) layer: Filtered<OpenTelemetryLayer<S, Tracer>, EnvFilter, S>,
}

impl<S> OtelTracer<S>
where
    S: tracing::Subscriber,
    for<'span> S: LookupSpan<'span>,
{
    /// Installs a batching OTLP exporter on the tokio runtime and wraps it in a layer.
    ///
    /// ## Arguments
    /// * `options` - Collector endpoint and service namespace.
    /// * `service_name` - Reported as the "service.name" resource.
    pub(super) fn new(options: OtelOptions, service_name: &str) -> Result<Self, TraceError> {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(options.endpoint);

        let resource = Resource::new(vec![
            KeyValue::new("service.name", service_name.to_owned()),
            KeyValue::new("service.namespace", options.namespace),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ]);

        opentelemetry::global::set_text_map_propagator(
            opentelemetry_sdk::propagation::TraceContextPropagator::new(),
        );

        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_trace_config(opentelemetry_sdk::trace::Config::default().with_resource(resource))
            .with_exporter(exporter)
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;

        let layer = tracing_opentelemetry::layer()
            .with_tracer(tracer)
            .with_filter(otel_filter());

        Ok(Self { layer })
    }
}

/// Spans are only exported when explicitly enabled through [OTEL_LEVEL_ENV].
fn otel_filter() -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::OFF.into())
        .with_env_var(OTEL_LEVEL_ENV)
        .from_env()
        .unwrap_or_else(|e| {
            warn!("Invalid directive(s) in {OTEL_LEVEL_ENV}: {e}");
            EnvFilter::default()
        })
}
