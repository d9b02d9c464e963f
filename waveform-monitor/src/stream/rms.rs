use super::{Mean, StreamData};
use waveform_analysis::Real;

/// Spread over buckets of the value of each point of each slot.
///
/// Every slot tracks `n_points` points, each with its own running mean over
/// buckets (kept by an inner [Mean]) and running variance. The variance is
/// updated online from the distance of each value to the mean before and
/// after it was added (Chan, Golub and LeVeque). [Rms::data] reports the
/// square root of the variance averaged over the slot's points.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Rms {
    means: Vec<Mean>,
    variances: Vec<Vec<Real>>,
    num_updates: u64,
}

impl Rms {
    pub fn new(n_data: usize, n_points: usize) -> Self {
        Self {
            means: vec![Mean::new(n_points, 1); n_data],
            variances: vec![vec![0.0; n_points]; n_data],
            num_updates: 0,
        }
    }
}

impl StreamData for Rms {
    type Datum = Real;

    fn fill(&mut self, instance_index: usize, datum_index: usize, datum: Real) {
        let (Some(mean), Some(variance)) = (
            self.means.get_mut(instance_index),
            self.variances
                .get_mut(instance_index)
                .and_then(|variances| variances.get_mut(datum_index)),
        ) else {
            return;
        };
        let last_mean = if self.num_updates == 0 {
            datum
        } else {
            mean.data(datum_index)
        };
        mean.fill(datum_index, 0, datum);
        let new_mean = mean.data(datum_index);
        *variance += ((datum - last_mean) * (datum - new_mean) - *variance)
            / (self.num_updates + 1) as Real;
    }

    /// Zero until two buckets have been closed.
    fn data(&self, index: usize) -> Real {
        if self.num_updates < 2 {
            return 0.0;
        }
        let Some(variances) = self.variances.get(index).filter(|v| !v.is_empty()) else {
            return 0.0;
        };
        let variance = variances.iter().sum::<Real>() / variances.len() as Real;
        variance.max(0.0).sqrt()
    }

    fn size(&self) -> usize {
        self.variances.len()
    }

    fn update(&mut self) {
        for mean in &mut self.means {
            mean.update();
        }
        self.num_updates += 1;
    }

    fn clear(&mut self) {
        for mean in &mut self.means {
            mean.clear();
        }
        for variances in &mut self.variances {
            variances.fill(0.0);
        }
        self.num_updates = 0;
    }

    /// Changes the number of points tracked by a slot, discarding its history.
    fn set_points_per_time(&mut self, index: usize, n_points: usize) {
        if let (Some(mean), Some(variances)) =
            (self.means.get_mut(index), self.variances.get_mut(index))
        {
            *mean = Mean::new(n_points, 1);
            variances.clear();
            variances.resize(n_points, 0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn zero_before_two_buckets() {
        let mut rms = Rms::new(1, 1);
        rms.fill(0, 0, 5.0);
        assert_eq!(rms.data(0), 0.0);
        rms.update();
        rms.fill(0, 0, 9.0);
        assert_eq!(rms.data(0), 0.0);
        rms.update();
        assert!(rms.data(0) > 0.0);
    }

    #[test]
    fn constant_input_has_no_spread() {
        let mut rms = Rms::new(2, 3);
        for _ in 0..200 {
            for point in 0..3 {
                rms.fill(1, point, 7.0);
            }
            rms.update();
        }
        assert_approx_eq!(rms.data(1), 0.0, 1e-3);
        assert_eq!(rms.data(0), 0.0);
    }

    #[test]
    fn alternating_input() {
        let (centre, delta) = (10.0, 2.0);
        let mut rms = Rms::new(1, 1);
        for bucket in 0..5000 {
            let value = if bucket % 2 == 0 {
                centre - delta
            } else {
                centre + delta
            };
            rms.fill(0, 0, value);
            rms.update();
        }
        assert_approx_eq!(rms.data(0), delta, 0.05);
    }

    #[test]
    fn points_are_averaged() {
        let mut rms = Rms::new(1, 2);
        for bucket in 0..5000 {
            let sign = if bucket % 2 == 0 { -1.0 } else { 1.0 };
            rms.fill(0, 0, sign * 1.0);
            rms.fill(0, 1, sign * 3.0);
            rms.update();
        }
        // Mean of the variances 1 and 9.
        assert_approx_eq!(rms.data(0), (5.0 as Real).sqrt(), 0.05);
    }

    #[test]
    fn resized_slot() {
        let mut rms = Rms::new(2, 1);
        rms.set_points_per_time(1, 4);
        for bucket in 0..1000 {
            rms.fill(1, 3, if bucket % 2 == 0 { 1.0 } else { -1.0 });
            rms.update();
        }
        // Only one of the four points varies.
        assert_approx_eq!(rms.data(1), 0.5, 0.05);
    }

    #[test]
    fn clear_resets() {
        let mut rms = Rms::new(1, 1);
        for value in [1.0, 5.0, 1.0] {
            rms.fill(0, 0, value);
            rms.update();
        }
        rms.clear();
        assert_eq!(rms.data(0), 0.0);
    }
}
