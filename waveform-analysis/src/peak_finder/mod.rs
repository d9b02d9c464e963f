mod polarity;
mod symmetric;

use crate::{AnalysisParameters, Peak, Real};
use clap::ValueEnum;
use daqmon_common::{
    PlaneType, Sample,
    metrics::{names::PEAKS_DISCARDED, peak_finders},
};
use metrics::counter;
use serde::Serialize;
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PeakFinderKind {
    /// Smoothed waveform compared against a threshold above the baseline.
    #[default]
    Symmetric,
    /// Unipolar search on collection channels, bipolar search on induction channels.
    PolarityAware,
}

impl PeakFinderKind {
    /// Appends the peaks of `waveform` to `peaks`, in order of their start index.
    pub(crate) fn find_peaks(
        &self,
        parameters: &AnalysisParameters,
        plane: PlaneType,
        waveform: &[Sample],
        baseline: Real,
        threshold: Real,
        peaks: &mut Vec<Peak>,
    ) {
        let mut sink = PeakSink { peaks, plane };
        match self {
            PeakFinderKind::Symmetric => symmetric::find_peaks(
                waveform,
                baseline,
                threshold,
                parameters.n_smoothing_samples,
                parameters.n_above_threshold as usize,
                &mut sink,
            ),
            PeakFinderKind::PolarityAware => {
                let invert = parameters.collection_negative && plane == PlaneType::Collection;
                let signal: Vec<Real> = waveform
                    .iter()
                    .map(|&sample| {
                        let value = Real::from(sample) - baseline;
                        if invert { -value } else { value }
                    })
                    .collect();
                match plane {
                    PlaneType::Collection => polarity::find_unipolar(
                        &signal,
                        threshold,
                        parameters.include_more_tail,
                        &mut sink,
                    ),
                    PlaneType::Induction => polarity::find_bipolar(&signal, threshold, &mut sink),
                }
            }
        }
    }
}

/// Collects candidate peaks, dropping those that do not span at least two samples.
pub(crate) struct PeakSink<'a> {
    peaks: &'a mut Vec<Peak>,
    plane: PlaneType,
}

impl PeakSink<'_> {
    pub(crate) fn push(&mut self, peak: Peak) {
        if peak.is_well_formed() {
            self.peaks.push(peak);
        } else {
            warn!(
                "Discarding peak with start {} end {} and peak {}",
                peak.start_index, peak.end_index, peak.peak_index
            );
            counter!(PEAKS_DISCARDED, &[peak_finders::get_label(self.plane)]).increment(1);
        }
    }
}

#[cfg(test)]
pub(crate) fn collect_peaks(f: impl FnOnce(&mut PeakSink)) -> Vec<Peak> {
    let mut peaks = Vec::new();
    let mut sink = PeakSink {
        peaks: &mut peaks,
        plane: PlaneType::Collection,
    };
    f(&mut sink);
    peaks
}
