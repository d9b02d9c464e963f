use super::StreamData;
use waveform_analysis::Real;

/// Values below this are not counted.
const FILL_FLOOR: Real = 1e-4;

/// Mean over buckets of the mean within each bucket, for slots filled an
/// irregular number of times.
///
/// Buckets in which a slot received no value do not contribute to that slot.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VariableMean {
    data: Vec<Real>,
    num_buckets: Vec<u64>,
    instance: Vec<Real>,
    instance_counts: Vec<u64>,
}

impl VariableMean {
    pub fn new(n_data: usize) -> Self {
        Self {
            data: vec![0.0; n_data],
            num_buckets: vec![0; n_data],
            instance: vec![0.0; n_data],
            instance_counts: vec![0; n_data],
        }
    }
}

impl StreamData for VariableMean {
    type Datum = Real;

    fn fill(&mut self, instance_index: usize, _datum_index: usize, datum: Real) {
        if datum < FILL_FLOOR {
            return;
        }
        if let (Some(instance), Some(count)) = (
            self.instance.get_mut(instance_index),
            self.instance_counts.get_mut(instance_index),
        ) {
            *instance += (datum - *instance) / (*count + 1) as Real;
            *count += 1;
        }
    }

    fn data(&self, index: usize) -> Real {
        self.data.get(index).copied().unwrap_or_default()
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn update(&mut self) {
        let slots = self
            .data
            .iter_mut()
            .zip(self.num_buckets.iter_mut())
            .zip(self.instance.iter_mut().zip(self.instance_counts.iter_mut()));
        for ((data, num_buckets), (instance, count)) in slots {
            if *count == 0 {
                continue;
            }
            *data += (*instance - *data) / (*num_buckets + 1) as Real;
            *num_buckets += 1;
            *instance = 0.0;
            *count = 0;
        }
    }

    fn clear(&mut self) {
        self.data.fill(0.0);
        self.num_buckets.fill(0);
        self.instance.fill(0.0);
        self.instance_counts.fill(0);
    }

    /// Bucket sizes are not fixed, so this does nothing.
    fn set_points_per_time(&mut self, _index: usize, _n_points: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn empty_buckets_are_skipped() {
        let mut mean = VariableMean::new(2);
        mean.fill(0, 0, 2.0);
        mean.fill(0, 0, 4.0);
        mean.update();
        mean.update();
        mean.fill(0, 0, 6.0);
        mean.update();
        assert_approx_eq!(mean.data(0), 4.5);
        assert_eq!(mean.data(1), 0.0);
    }

    #[test]
    fn near_zero_values_are_ignored() {
        let mut mean = VariableMean::new(1);
        mean.fill(0, 0, 3.0);
        mean.fill(0, 0, 0.0);
        mean.fill(0, 0, -5.0);
        mean.update();
        assert_approx_eq!(mean.data(0), 3.0);

        mean.fill(0, 0, 0.00001);
        mean.update();
        assert_approx_eq!(mean.data(0), 3.0);
    }

    #[test]
    fn buckets_weigh_equally() {
        let mut mean = VariableMean::new(1);
        for value in [1.0, 1.0, 1.0, 1.0] {
            mean.fill(0, 0, value);
        }
        mean.update();
        mean.fill(0, 0, 3.0);
        mean.update();
        assert_approx_eq!(mean.data(0), 2.0);
    }

    #[test]
    fn clear_resets() {
        let mut mean = VariableMean::new(1);
        mean.fill(0, 0, 7.0);
        mean.update();
        mean.fill(0, 0, 7.0);
        mean.clear();
        assert_eq!(mean.data(0), 0.0);
        mean.update();
        assert_eq!(mean.data(0), 0.0);
    }
}
