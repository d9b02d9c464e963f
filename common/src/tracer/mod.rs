mod otel_tracer;
mod tracer_engine;

pub use otel_tracer::{OtelOptions, OtelTracer};
pub use tracer_engine::{TracerEngine, TracerError, TracerOptions};

/// Installs the tracing subscriber for a binary, named after the binary.
///
/// Evaluates to `Result<TracerEngine, TracerError>`. Requires `TracerEngine`
/// and `tracing::warn` in scope at the call site, so that OpenTelemetry
/// export errors are reported from the caller's module.
#[macro_export]
macro_rules! init_tracer {
    ($options:expr) => {
        TracerEngine::new($options, env!("CARGO_BIN_NAME")).inspect(|tracer| {
            if tracer.use_otel() {
                if let Err(e) = tracer.set_otel_error_handler(|e| warn!("{e}")) {
                    warn!("{e}");
                }
            }
        })
    };
}
