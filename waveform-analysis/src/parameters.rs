use crate::{
    Real, baseline::BaselineMethod, noise::NoiseRangeSampling, peak_finder::PeakFinderKind,
    threshold::ThresholdMethod,
};
use clap::Parser;
use serde::Serialize;

/// Controls every step of the per-channel and per-event analysis.
///
/// Every field maps to a `--long` option so the whole structure can be
/// flattened into a binary's command line.
#[derive(Debug, Clone, Parser, Serialize)]
pub struct AnalysisParameters {
    /// How the baseline of each waveform is estimated.
    #[clap(long, default_value = "pedestal")]
    pub baseline_calc: BaselineMethod,

    /// Stride used when histogramming samples for the mode baseline.
    #[clap(long, default_value = "1")]
    pub n_mode_skip: usize,

    /// Recompute the baseline as the mean over the noise sample.
    #[clap(long)]
    pub refine_baseline: bool,

    /// How the detection threshold is derived.
    #[clap(long, default_value = "static")]
    pub threshold_calc: ThresholdMethod,

    /// Threshold in ADC counts, used by the static method.
    #[clap(long, default_value = "100")]
    pub threshold: Real,

    /// Multiple of the noise width used by the noise-relative methods.
    #[clap(long, default_value = "5")]
    pub threshold_sigma: Real,

    /// Scale the threshold of collection channels by 1.5.
    #[clap(long)]
    pub use_planes: bool,

    /// How the pulse-free samples are chosen.
    #[clap(long, default_value = "fixed-window")]
    pub noise_range_sampling: NoiseRangeSampling,

    /// Length of the window used by the fixed-window sampling.
    #[clap(long, default_value = "20")]
    pub n_noise_samples: usize,

    /// Algorithm used to locate pulses.
    #[clap(long, default_value = "symmetric")]
    pub peak_finder: PeakFinderKind,

    /// Half-width of the smoothing window of the symmetric peak finder.
    #[clap(long, default_value = "1")]
    pub n_smoothing_samples: usize,

    /// Consecutive samples above threshold required by the symmetric peak finder.
    #[clap(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub n_above_threshold: u32,

    /// Extends the charge integration window of unipolar pulses by this
    /// fraction of their width on each side.
    #[clap(long, default_value = "0")]
    pub include_more_tail: Real,

    /// Collection pulses point towards negative ADC values.
    #[clap(long)]
    pub collection_negative: bool,

    /// Pre-size the transform context. Negative values leave it unsized.
    #[clap(long, default_value = "-1", allow_hyphen_values = true)]
    pub static_input_size: i32,

    /// Compute the spectrum of every channel.
    #[clap(long)]
    pub fft_per_channel: bool,

    /// Sum the waveforms of each readout group.
    #[clap(long)]
    pub sum_waveforms: bool,

    /// Compute the magnitude spectrum of each summed waveform.
    #[clap(long)]
    pub fft_summed_waveforms: bool,

    /// Keep a copy of each waveform in its result.
    #[clap(long)]
    pub fill_waveforms: bool,
}

impl AnalysisParameters {
    pub(crate) fn static_input_size(&self) -> Option<usize> {
        usize::try_from(self.static_input_size)
            .ok()
            .filter(|&size| size > 0)
    }
}

impl Default for AnalysisParameters {
    fn default() -> Self {
        Self::parse_from(["waveform-analysis"])
    }
}
