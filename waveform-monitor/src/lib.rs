//! Online monitoring of digitised waveforms.
//!
//! Events from an [EventSource] are analysed by a
//! [waveform_analysis::EventProcessor], accumulated into per-channel and
//! per-group time series by a [Monitor], and published through an [OutputSink].
pub mod index;
pub mod monitor;
pub mod results;
pub mod sink;
pub mod source;
pub mod stream;

pub use index::StreamDataIndex;
pub use monitor::{Monitor, MonitorOptions};
pub use results::ResultsWriter;
pub use sink::{OutputSink, PrintSink, RedisSink, SinkError, SinkKind};
pub use source::EventSource;
