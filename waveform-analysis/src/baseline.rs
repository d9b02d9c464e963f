use crate::Real;
use clap::ValueEnum;
use daqmon_common::Sample;
use serde::Serialize;
use std::collections::BTreeMap;

/// Initial estimate of the level a waveform sits at in the absence of signal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaselineMethod {
    /// The baseline is fixed at zero.
    #[value(alias = "0")]
    Zero,
    /// The pedestal supplied alongside the waveform is taken as authoritative.
    #[default]
    #[value(alias = "1")]
    Pedestal,
    /// The most common sample value, found from every `n_mode_skip`-th sample.
    #[value(alias = "2")]
    Mode,
}

impl BaselineMethod {
    pub(crate) fn estimate(&self, waveform: &[Sample], pedestal: Real, n_mode_skip: usize) -> Real {
        match self {
            BaselineMethod::Zero => 0.0,
            BaselineMethod::Pedestal => pedestal,
            BaselineMethod::Mode => mode(waveform, n_mode_skip).map_or(0.0, Real::from),
        }
    }
}

/// Returns the most frequent value among the samples taken at the given stride.
/// Ties resolve to the smallest value. A stride of zero is treated as one.
pub(crate) fn mode(waveform: &[Sample], stride: usize) -> Option<Sample> {
    let mut counts = BTreeMap::<Sample, usize>::new();
    for &sample in waveform.iter().step_by(stride.max(1)) {
        *counts.entry(sample).or_default() += 1;
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(Sample, usize)>, (value, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((value, count)),
        })
        .map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_pedestal() {
        let waveform = [5, 6, 7];
        assert_eq!(BaselineMethod::Zero.estimate(&waveform, 3.5, 1), 0.0);
        assert_eq!(BaselineMethod::Pedestal.estimate(&waveform, 3.5, 1), 3.5);
    }

    #[test]
    fn mode_of_waveform() {
        let waveform = [10, 12, 12, 11, 12, 10, 300, 301];
        assert_eq!(mode(&waveform, 1), Some(12));
        assert_eq!(BaselineMethod::Mode.estimate(&waveform, 0.0, 1), 12.0);
    }

    #[test]
    fn mode_ties_pick_smallest() {
        assert_eq!(mode(&[4, 3, 4, 3], 1), Some(3));
    }

    #[test]
    fn mode_with_stride() {
        // Only indices 0, 2, 4 and 6 are sampled.
        let waveform = [7, 1, 7, 1, 9, 1, 9];
        assert_eq!(mode(&waveform, 2), Some(7));
        assert_eq!(mode(&waveform, 0), Some(1));
    }

    #[test]
    fn mode_of_empty_waveform() {
        assert_eq!(mode(&[], 3), None);
        assert_eq!(BaselineMethod::Mode.estimate(&[], 12.0, 3), 0.0);
    }
}
