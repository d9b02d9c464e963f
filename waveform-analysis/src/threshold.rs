use crate::{AnalysisParameters, NoiseSample, Real};
use clap::ValueEnum;
use daqmon_common::{PlaneType, Sample};
use serde::Serialize;
use std::collections::BTreeMap;

/// Collection channels are given a higher threshold when plane-aware scaling is on.
const COLLECTION_SIGMA_SCALE: Real = 1.5;

/// Histogram bins below this fraction of the most populated bin are left out of the fit.
const GAUSS_FIT_MIN_FRACTION: Real = 0.1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdMethod {
    /// The configured `threshold`.
    #[default]
    #[value(alias = "0")]
    Static,
    /// Width of a gaussian fitted to the sample distribution, times `threshold_sigma`.
    #[value(alias = "1")]
    GaussFit,
    /// RMS of the whole waveform, times `threshold_sigma`.
    #[value(alias = "2")]
    RawRms,
    /// Running mean of the channel's noise RMS over past events, times `threshold_sigma`.
    #[value(alias = "3")]
    Running,
}

impl ThresholdMethod {
    pub(crate) fn threshold(
        &self,
        parameters: &AnalysisParameters,
        plane: PlaneType,
        waveform: &[Sample],
        baseline: Real,
        running: &RunningThreshold,
    ) -> Real {
        match self {
            ThresholdMethod::Static => parameters.threshold,
            ThresholdMethod::GaussFit => {
                let width = gauss_fit_width(waveform, baseline).unwrap_or_else(|| {
                    NoiseSample::full_waveform(waveform.len(), baseline).rms(waveform)
                });
                width * parameters.threshold_sigma
            }
            ThresholdMethod::RawRms => {
                NoiseSample::full_waveform(waveform.len(), baseline).rms(waveform)
                    * parameters.threshold_sigma
            }
            ThresholdMethod::Running => {
                let n_sigma = if parameters.use_planes && plane == PlaneType::Collection {
                    parameters.threshold_sigma * COLLECTION_SIGMA_SCALE
                } else {
                    parameters.threshold_sigma
                };
                running.threshold(waveform, baseline, n_sigma)
            }
        }
    }
}

/// Fits a gaussian to the distribution of deviations from `baseline` and
/// returns its standard deviation.
///
/// The fit is a weighted parabola through the logarithm of the histogram
/// counts. Returns `None` if fewer than three bins qualify or the fitted
/// curve does not open downwards.
pub(crate) fn gauss_fit_width(waveform: &[Sample], baseline: Real) -> Option<Real> {
    let mut histogram = BTreeMap::<i64, u64>::new();
    for &sample in waveform {
        let deviation = (Real::from(sample) - baseline).round() as i64;
        *histogram.entry(deviation).or_default() += 1;
    }
    let max_count = histogram.values().copied().max()? as Real;

    // Normal equations of sum w (ln y - a - b x - c x^2)^2, weighted by the counts.
    let mut moments = [0.0; 5];
    let mut targets = [0.0; 3];
    let mut n_bins = 0;
    for (&deviation, &count) in &histogram {
        let count = count as Real;
        if count < GAUSS_FIT_MIN_FRACTION * max_count {
            continue;
        }
        n_bins += 1;
        let x = deviation as Real;
        let log_count = count.ln();
        let mut power = count;
        for (order, moment) in moments.iter_mut().enumerate() {
            *moment += power;
            if let Some(target) = targets.get_mut(order) {
                *target += power * log_count;
            }
            power *= x;
        }
    }
    if n_bins < 3 {
        return None;
    }
    let matrix = [
        [moments[0], moments[1], moments[2]],
        [moments[1], moments[2], moments[3]],
        [moments[2], moments[3], moments[4]],
    ];
    let curvature = solve_for_last(matrix, targets)?;
    (curvature < 0.0).then(|| (-1.0 / (2.0 * curvature)).sqrt())
}

fn determinant(m: [[Real; 3]; 3]) -> Real {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// Solves `m . v = rhs` for the last component of `v` by Cramer's rule.
fn solve_for_last(m: [[Real; 3]; 3], rhs: [Real; 3]) -> Option<Real> {
    let denominator = determinant(m);
    if denominator.abs() < Real::EPSILON {
        return None;
    }
    let mut substituted = m;
    for (row, value) in substituted.iter_mut().zip(rhs) {
        row[2] = value;
    }
    Some(determinant(substituted) / denominator)
}

/// Cross-event running mean of a channel's noise RMS.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunningThreshold {
    mean_rms: Real,
    num_values: u64,
}

impl RunningThreshold {
    pub fn add_rms(&mut self, rms: Real) {
        self.mean_rms += (rms - self.mean_rms) / (self.num_values + 1) as Real;
        self.num_values += 1;
    }

    /// The running mean, if any value has been added since the last reset.
    pub fn mean_rms(&self) -> Option<Real> {
        (self.num_values > 0).then_some(self.mean_rms)
    }

    /// `n_sigma` times the running mean. Before any value has been added, the
    /// RMS of the whole of `waveform` is used instead.
    pub fn threshold(&self, waveform: &[Sample], baseline: Real, n_sigma: Real) -> Real {
        let rms = self.mean_rms().unwrap_or_else(|| {
            NoiseSample::full_waveform(waveform.len(), baseline).rms(waveform)
        });
        rms * n_sigma
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
