//! Destinations for published monitoring points.
//!
//! Delivery failures are logged and counted but never returned to the caller,
//! so an unavailable sink cannot interrupt the analysis.
mod print;
mod redis;

pub use self::print::PrintSink;
pub use self::redis::RedisSink;

use clap::ValueEnum;
use daqmon_common::metrics::{
    failures::{self, FailureKind},
    names::{FAILURES, POINTS_PUBLISHED},
};
use metrics::counter;
use thiserror::Error;
use tracing::warn;
use waveform_analysis::Real;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Redis: {0}")]
    Redis(#[from] ::redis::RedisError),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    /// Key-value store reached at `--redis-url`.
    Redis,
    /// Standard output.
    #[default]
    Print,
}

pub enum OutputSink {
    Redis(RedisSink),
    Print(PrintSink),
}

impl OutputSink {
    /// Publishes `value` under `stream`, `index` and `metric`.
    /// A nonzero `expire` asks the sink to drop the point after that many seconds.
    pub fn send(&mut self, stream: &str, index: &str, metric: &str, value: Real, expire: u32) {
        let result = match self {
            OutputSink::Redis(sink) => {
                sink.send(stream, index, metric, value, expire);
                Ok(())
            }
            OutputSink::Print(sink) => sink.send(stream, index, metric, value),
        };
        if let Err(e) = result {
            report_failure(e);
        }
    }

    /// Delivers anything the sink has buffered and returns the number of
    /// points known to have arrived since the last flush.
    pub fn flush(&mut self) -> usize {
        let result = match self {
            OutputSink::Redis(sink) => sink.flush(),
            OutputSink::Print(sink) => sink.flush(),
        };
        match result {
            Ok(num_points) => {
                counter!(POINTS_PUBLISHED).increment(num_points as u64);
                num_points
            }
            Err(e) => {
                report_failure(e);
                0
            }
        }
    }
}

fn report_failure(error: SinkError) {
    warn!("Failed to publish monitoring data: {error}");
    counter!(
        FAILURES,
        &[failures::get_label(FailureKind::SinkPublishFailed)]
    )
    .increment(1);
}
