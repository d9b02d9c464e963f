use crate::{Peak, Real};
use clap::ValueEnum;
use daqmon_common::Sample;
use serde::Serialize;

/// Chooses which samples of a waveform are treated as pulse free.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoiseRangeSampling {
    /// The leading `n_noise_samples` samples.
    #[default]
    #[value(alias = "0")]
    FixedWindow,
    /// Every sample not covered by a detected peak.
    #[value(alias = "1")]
    ExcludePeaks,
}

/// An inclusive interval of sample indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct NoiseRange {
    pub start: usize,
    pub end: usize,
}

impl NoiseRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Iterates over the indices of the range that fall inside a waveform of length `len`.
    fn indices(&self, len: usize) -> std::ops::Range<usize> {
        self.start.min(len)..self.end.saturating_add(1).min(len)
    }
}

/// The pulse-free part of a waveform, together with the baseline it is measured against.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NoiseSample {
    ranges: Vec<NoiseRange>,
    baseline: Real,
}

impl NoiseSample {
    pub fn new(ranges: Vec<NoiseRange>, baseline: Real) -> Self {
        Self { ranges, baseline }
    }

    /// The leading window `[0, n - 1]`. Indices past the end of a waveform are ignored
    /// when the sample is evaluated.
    pub fn fixed_window(n: usize, baseline: Real) -> Self {
        let ranges = n
            .checked_sub(1)
            .map(|end| NoiseRange::new(0, end))
            .into_iter()
            .collect();
        Self { ranges, baseline }
    }

    /// The whole of a waveform of length `len`.
    pub fn full_waveform(len: usize, baseline: Real) -> Self {
        Self::fixed_window(len, baseline)
    }

    /// The complement of the given peaks within `[0, len - 1]`.
    ///
    /// Overlapping or unordered peaks are merged before the complement is taken,
    /// so the returned ranges are disjoint and in ascending order.
    pub fn excluding_peaks(peaks: &[Peak], baseline: Real, len: usize) -> Self {
        let mut covered: Vec<(usize, usize)> = peaks
            .iter()
            .filter(|peak| peak.start_index < len)
            .map(|peak| (peak.start_index, peak.end_index.min(len - 1)))
            .collect();
        covered.sort_unstable();

        let mut ranges = Vec::with_capacity(covered.len() + 1);
        let mut next_free = 0;
        for (start, end) in covered {
            if start > next_free {
                ranges.push(NoiseRange::new(next_free, start - 1));
            }
            next_free = next_free.max(end + 1);
        }
        if next_free < len {
            ranges.push(NoiseRange::new(next_free, len - 1));
        }
        Self { ranges, baseline }
    }

    pub fn ranges(&self) -> &[NoiseRange] {
        &self.ranges
    }

    pub fn baseline(&self) -> Real {
        self.baseline
    }

    /// Iterates over the samples of `waveform` selected by this sample's ranges.
    fn samples<'a>(&'a self, waveform: &'a [Sample]) -> impl Iterator<Item = Real> + 'a {
        self.ranges
            .iter()
            .flat_map(|range| range.indices(waveform.len()))
            .filter_map(|index| waveform.get(index).copied().map(Real::from))
    }

    /// Sets the baseline to the mean of the selected samples, if there are any.
    pub fn refine_baseline(&mut self, waveform: &[Sample]) {
        let (sum, count) = self
            .samples(waveform)
            .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
        if count > 0 {
            self.baseline = sum / count as Real;
        }
    }

    /// Root-mean-square deviation from the baseline over the selected samples,
    /// zero if none are selected.
    pub fn rms(&self, waveform: &[Sample]) -> Real {
        let (sum_sq, count) = self
            .samples(waveform)
            .fold((0.0, 0usize), |(sum_sq, count), value| {
                (sum_sq + (value - self.baseline).powi(2), count + 1)
            });
        if count == 0 {
            0.0
        } else {
            (sum_sq / count as Real).sqrt()
        }
    }

    /// RMS of the difference between this channel's and a neighbour's
    /// baseline-subtracted samples, taken over this sample's ranges.
    ///
    /// Indices missing from either waveform are skipped. Returns zero if
    /// no index is common to both.
    pub fn dnoise(&self, waveform: &[Sample], other: &NoiseSample, other_waveform: &[Sample]) -> Real {
        let len = waveform.len().min(other_waveform.len());
        let (sum_sq, count) = self
            .ranges
            .iter()
            .flat_map(|range| range.indices(len))
            .filter_map(|index| Some((*waveform.get(index)?, *other_waveform.get(index)?)))
            .fold((0.0, 0usize), |(sum_sq, count), (this, next)| {
                let difference =
                    (Real::from(this) - self.baseline) - (Real::from(next) - other.baseline);
                (sum_sq + difference.powi(2), count + 1)
            });
        if count == 0 {
            0.0
        } else {
            (sum_sq / count as Real).sqrt()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn peak(start_index: usize, end_index: usize) -> Peak {
        Peak {
            start_index,
            end_index,
            peak_index: start_index,
            ..Default::default()
        }
    }

    #[test]
    fn fixed_window_ignores_content() {
        let sample = NoiseSample::fixed_window(20, 3.0);
        assert_eq!(sample.ranges(), &[NoiseRange::new(0, 19)]);

        let short = [1, 2, 3];
        assert_eq!(sample.ranges(), &[NoiseRange::new(0, 19)]);
        assert_approx_eq!(sample.rms(&short), ((4.0 + 1.0 + 0.0) / 3.0 as Real).sqrt());
    }

    #[test]
    fn empty_window_has_zero_rms() {
        let sample = NoiseSample::fixed_window(0, 0.0);
        assert!(sample.ranges().is_empty());
        assert_eq!(sample.rms(&[100, -100]), 0.0);
        assert_eq!(NoiseSample::default().rms(&[]), 0.0);
    }

    #[test]
    fn rms_about_baseline() {
        let waveform = [9, 11, 9, 11];
        let sample = NoiseSample::full_waveform(waveform.len(), 10.0);
        assert_approx_eq!(sample.rms(&waveform), 1.0);
    }

    #[test]
    fn complement_of_peaks() {
        let sample = NoiseSample::excluding_peaks(&[peak(3, 5), peak(8, 9)], 0.0, 12);
        assert_eq!(
            sample.ranges(),
            &[
                NoiseRange::new(0, 2),
                NoiseRange::new(6, 7),
                NoiseRange::new(10, 11)
            ]
        );
    }

    #[test]
    fn complement_covers_waveform_once() {
        let len = 30;
        let peaks = [peak(0, 4), peak(12, 15), peak(14, 20), peak(26, 29)];
        let sample = NoiseSample::excluding_peaks(&peaks, 0.0, len);

        let mut noise_count = vec![0; len];
        for range in sample.ranges() {
            for index in range.start..=range.end {
                noise_count[index] += 1;
            }
        }
        let mut in_peak = vec![false; len];
        for peak in &peaks {
            for index in peak.start_index..=peak.end_index {
                in_peak[index] = true;
            }
        }
        for index in 0..len {
            assert_eq!(noise_count[index], usize::from(!in_peak[index]));
        }
        assert_eq!(
            sample.ranges(),
            &[NoiseRange::new(5, 11), NoiseRange::new(21, 25)]
        );
    }

    #[test]
    fn no_peaks_covers_everything() {
        let sample = NoiseSample::excluding_peaks(&[], 0.0, 7);
        assert_eq!(sample.ranges(), &[NoiseRange::new(0, 6)]);
        assert!(NoiseSample::excluding_peaks(&[], 0.0, 0).ranges().is_empty());
    }

    #[test]
    fn refined_baseline_is_mean_of_noise() {
        let waveform = [2, 4, 100, 100, 6];
        let mut sample = NoiseSample::excluding_peaks(&[peak(2, 3)], 0.0, waveform.len());
        sample.refine_baseline(&waveform);
        assert_approx_eq!(sample.baseline(), 4.0);
    }

    #[test]
    fn refining_empty_sample_keeps_baseline() {
        let mut sample = NoiseSample::fixed_window(0, 7.5);
        sample.refine_baseline(&[1, 2, 3]);
        assert_eq!(sample.baseline(), 7.5);
    }

    #[test]
    fn dnoise_of_identical_noise_is_zero() {
        let waveform = [1, -2, 3, -1, 0, 2];
        let shifted: Vec<Sample> = waveform.iter().map(|sample| sample + 50).collect();
        let this = NoiseSample::full_waveform(waveform.len(), 0.0);
        let next = NoiseSample::full_waveform(shifted.len(), 50.0);
        assert_approx_eq!(this.dnoise(&waveform, &next, &shifted), 0.0);
    }

    #[test]
    fn dnoise_of_opposite_noise() {
        let waveform = [1, -1, 1, -1];
        let inverted = [-1, 1, -1, 1];
        let this = NoiseSample::full_waveform(4, 0.0);
        let next = NoiseSample::full_waveform(4, 0.0);
        assert_approx_eq!(this.dnoise(&waveform, &next, &inverted), 2.0);
        assert_eq!(this.dnoise(&waveform, &next, &[]), 0.0);
    }
}
