use super::otel_tracer::{OtelOptions, OtelTracer};
use opentelemetry::{global::Error, trace::TraceError};
use thiserror::Error;
use tracing::{info, subscriber::SetGlobalDefaultError, warn};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt};

#[derive(Debug, Error)]
pub enum TracerError {
    #[error("Cannot install the tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

pub struct TracerOptions<'a> {
    pub otel_options: Option<OtelOptions<'a>>,
}

impl<'a> TracerOptions<'a> {
    pub fn new(endpoint: Option<&'a str>, namespace: String) -> Self {
        Self {
            otel_options: endpoint.map(|endpoint| OtelOptions {
                endpoint,
                namespace,
            }),
        }
    }
}

/// Owns the process-wide tracing subscriber.
///
/// Log lines go to stderr, leaving stdout to the console output sink.
/// Spans are also exported over OTLP when an endpoint was given and the
/// exporter could be started. Dropping the engine flushes the exporter.
pub struct TracerEngine {
    use_otel: bool,
}

impl TracerEngine {
    pub fn use_otel(&self) -> bool {
        self.use_otel
    }

    pub fn set_otel_error_handler<F>(&self, f: F) -> Result<(), Error>
    where
        F: Fn(Error) + Send + Sync + 'static,
    {
        opentelemetry::global::set_error_handler(f)
    }

    /// Installs the global subscriber. Must be called at most once per process.
    ///
    /// A collector that cannot be reached is not an error: the engine falls
    /// back to logging only and says so once the subscriber is running.
    pub fn new(options: TracerOptions, service_name: &str) -> Result<Self, TracerError> {
        let endpoint = options.otel_options.as_ref().map(|otel| otel.endpoint.to_owned());
        let otel_tracer: Option<Result<OtelTracer<_>, TraceError>> = options
            .otel_options
            .map(|otel_options| OtelTracer::new(otel_options, service_name));
        let (otel_layer, otel_error) = match otel_tracer {
            Some(Ok(tracer)) => (Some(tracer.layer), None),
            Some(Err(e)) => (None, Some(e)),
            None => (None, None),
        };
        let use_otel = otel_layer.is_some();

        let log_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(EnvFilter::from_default_env());

        tracing::subscriber::set_global_default(
            tracing_subscriber::Registry::default()
                .with(log_layer)
                .with(otel_layer),
        )?;

        match (endpoint, otel_error) {
            (Some(endpoint), Some(e)) => {
                warn!("OpenTelemetry disabled, cannot export to {endpoint}: {e}")
            }
            (Some(endpoint), None) => info!("Exporting spans to {endpoint}"),
            _ => {}
        }
        Ok(Self { use_otel })
    }
}

impl Drop for TracerEngine {
    fn drop(&mut self) {
        if self.use_otel {
            opentelemetry::global::shutdown_tracer_provider()
        }
    }
}
