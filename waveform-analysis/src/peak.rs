use crate::Real;
use serde::Serialize;

/// A detected pulse. Indices are inclusive and refer to the raw waveform.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Peak {
    pub start_index: usize,
    pub end_index: usize,
    /// Index of the sample the amplitude was taken from.
    pub peak_index: usize,
    /// Sub-sample estimate of the pulse time, in samples.
    pub peak_time: Real,
    /// Height above the baseline.
    pub amplitude: Real,
    pub integrated_charge: Real,
    pub width_rms: Real,
}

impl Peak {
    /// Number of samples spanned by the peak.
    pub fn width(&self) -> usize {
        self.end_index.saturating_sub(self.start_index) + 1
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        self.start_index < self.end_index
            && (self.start_index..=self.end_index).contains(&self.peak_index)
    }
}

/// Charge-weighted RMS distance of the samples in `values` from `peak_index`.
///
/// `first_index` is the waveform index of `values[0]`. Returns zero when the
/// weighted variance is not positive.
pub(crate) fn charge_weighted_width(values: &[Real], first_index: usize, peak_index: usize) -> Real {
    let (weighted, charge) = values
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(weighted, charge), (offset, &value)| {
            let distance = (first_index + offset) as Real - peak_index as Real;
            (weighted + distance * distance * value, charge + value)
        });
    if charge <= 0.0 {
        return 0.0;
    }
    let variance = weighted / charge;
    if variance > 0.0 { variance.sqrt() } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn width_of_peak() {
        let peak = Peak {
            start_index: 4,
            end_index: 9,
            peak_index: 6,
            ..Default::default()
        };
        assert_eq!(peak.width(), 6);
        assert!(peak.is_well_formed());
    }

    #[test]
    fn single_sample_is_malformed() {
        let peak = Peak {
            start_index: 4,
            end_index: 4,
            peak_index: 4,
            ..Default::default()
        };
        assert!(!peak.is_well_formed());
    }

    #[test]
    fn weighted_width() {
        // Unit charge one sample either side of the peak.
        assert_approx_eq!(charge_weighted_width(&[1.0, 0.0, 1.0], 10, 11), 1.0);
        assert_approx_eq!(charge_weighted_width(&[0.0, 5.0, 0.0], 10, 11), 0.0);
        assert_eq!(charge_weighted_width(&[], 0, 0), 0.0);
    }
}
