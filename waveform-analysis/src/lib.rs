//! Per-channel feature extraction for digitised detector waveforms.
//!
//! For every event, each channel's waveform is reduced to a [ChannelResult]:
//! a baseline, the noise RMS over the samples judged to be pulse free,
//! a detection threshold, the list of detected [Peak]s and, optionally,
//! its frequency spectrum. Once all channels are done, adjacent channels are
//! compared to estimate the noise they share.
//!
//! Typical usage:
//! ```ignore
//! let mut processor = EventProcessor::new(parameters, Box::new(channel_map));
//! for event in events {
//!     processor.process(&event);
//!     for result in processor.results() {
//!         // ...
//!     }
//! }
//! ```
pub(crate) mod baseline;
pub(crate) mod channel;
pub(crate) mod coherent;
pub(crate) mod event;
pub(crate) mod noise;
pub(crate) mod parameters;
pub(crate) mod peak;
pub(crate) mod peak_finder;
pub(crate) mod threshold;
pub(crate) mod transform;

pub use baseline::BaselineMethod;
pub use channel::ChannelResult;
pub use event::{ChannelWaveform, Event, EventInfo, EventProcessor, GroupSummary};
pub use noise::{NoiseRange, NoiseRangeSampling, NoiseSample};
pub use parameters::AnalysisParameters;
pub use peak::Peak;
pub use peak_finder::PeakFinderKind;
pub use threshold::{RunningThreshold, ThresholdMethod};
pub use transform::TransformContext;

pub type Real = f64;

/// RMS values at or below this are treated as degenerate.
pub const RMS_FLOOR: Real = 1e-4;
