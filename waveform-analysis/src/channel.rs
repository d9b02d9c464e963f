use crate::{
    AnalysisParameters, NoiseRange, NoiseRangeSampling, NoiseSample, Peak, Real, RunningThreshold,
    ThresholdMethod, TransformContext,
};
use daqmon_common::{Channel, PlaneType, Sample};
use serde::Serialize;

/// Features extracted from one channel's waveform in one event.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ChannelResult {
    pub channel: Channel,
    /// No samples were received for this channel.
    pub empty: bool,
    pub baseline: Real,
    pub rms: Real,
    pub threshold: Real,
    pub min: Sample,
    pub max: Sample,
    /// Fraction of samples covered by peaks.
    pub occupancy: Real,
    pub mean_peak_height: Real,
    pub next_channel_dnoise: Real,
    pub peaks: Vec<Peak>,
    pub noise_ranges: Vec<NoiseRange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transform_real: Vec<Real>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transform_imag: Vec<Real>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub waveform: Vec<Sample>,
}

impl ChannelResult {
    /// Returns the result to its empty state, keeping the capacity of its sequences.
    pub(crate) fn reset(&mut self, channel: Channel) {
        self.channel = channel;
        self.empty = true;
        self.baseline = 0.0;
        self.rms = 0.0;
        self.threshold = 0.0;
        self.min = 0;
        self.max = 0;
        self.occupancy = 0.0;
        self.mean_peak_height = 0.0;
        self.next_channel_dnoise = 0.0;
        self.peaks.clear();
        self.noise_ranges.clear();
        self.transform_real.clear();
        self.transform_imag.clear();
        self.waveform.clear();
    }

    fn occupancy(&self, len: usize) -> Real {
        if len == 0 {
            return 0.0;
        }
        let covered: usize = self.peaks.iter().map(Peak::width).sum();
        covered as Real / len as Real
    }

    fn mean_peak_height(&self) -> Real {
        if self.peaks.is_empty() {
            return 0.0;
        }
        self.peaks.iter().map(|peak| peak.amplitude).sum::<Real>() / self.peaks.len() as Real
    }
}

/// Per-channel state that outlives a single event.
#[derive(Debug, Default)]
pub(crate) struct ChannelSlot {
    pub(crate) result: ChannelResult,
    pub(crate) noise: NoiseSample,
    pub(crate) running_threshold: RunningThreshold,
}

impl ChannelSlot {
    /// Extracts the features of `waveform` into this slot's result.
    ///
    /// The running threshold is fed the final RMS exactly once when the running
    /// method is selected. Empty waveforms leave the result and noise sample empty.
    #[tracing::instrument(skip_all, level = "trace", fields(channel = channel, len = waveform.len()))]
    pub(crate) fn process(
        &mut self,
        parameters: &AnalysisParameters,
        channel: Channel,
        plane: PlaneType,
        waveform: &[Sample],
        pedestal: Real,
        transform: &mut TransformContext,
    ) {
        let result = &mut self.result;
        result.reset(channel);
        if waveform.is_empty() {
            self.noise = NoiseSample::default();
            return;
        }
        result.empty = false;

        result.min = waveform.iter().copied().min().unwrap_or_default();
        result.max = waveform.iter().copied().max().unwrap_or_default();
        if parameters.fill_waveforms {
            result.waveform.extend_from_slice(waveform);
        }

        let baseline =
            parameters
                .baseline_calc
                .estimate(waveform, pedestal, parameters.n_mode_skip);
        result.baseline = baseline;

        if parameters.fft_per_channel {
            transform.load(waveform.iter().copied().map(Real::from));
            transform.execute();
            let output_size = transform.output_size();
            result
                .transform_real
                .extend((0..output_size).map(|index| transform.real_at(index)));
            result
                .transform_imag
                .extend((0..output_size).map(|index| transform.imag_at(index)));
        }

        result.threshold = parameters.threshold_calc.threshold(
            parameters,
            plane,
            waveform,
            baseline,
            &self.running_threshold,
        );
        parameters.peak_finder.find_peaks(
            parameters,
            plane,
            waveform,
            baseline,
            result.threshold,
            &mut result.peaks,
        );

        self.noise = match parameters.noise_range_sampling {
            NoiseRangeSampling::FixedWindow => {
                NoiseSample::fixed_window(parameters.n_noise_samples, baseline)
            }
            NoiseRangeSampling::ExcludePeaks => {
                NoiseSample::excluding_peaks(&result.peaks, baseline, waveform.len())
            }
        };
        if parameters.refine_baseline {
            self.noise.refine_baseline(waveform);
            result.baseline = self.noise.baseline();
        }
        result.rms = self.noise.rms(waveform);
        result.noise_ranges.extend_from_slice(self.noise.ranges());

        if parameters.threshold_calc == ThresholdMethod::Running {
            self.running_threshold.add_rms(result.rms);
        }

        result.occupancy = result.occupancy(waveform.len());
        result.mean_peak_height = result.mean_peak_height();
    }

    pub(crate) fn clear(&mut self, channel: Channel) {
        self.result.reset(channel);
        self.noise = NoiseSample::default();
    }
}
