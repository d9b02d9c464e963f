use super::StreamData;
use waveform_analysis::Real;

/// Mean over buckets of a per-bucket average with a known number of points.
///
/// Each fill contributes `datum / points_per_time` to its slot's bucket, so a
/// bucket receiving exactly `points_per_time` values holds their mean. Every
/// update counts as a bucket for every slot, whether it was filled or not.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mean {
    data: Vec<Real>,
    instance: Vec<Real>,
    points_per_time: Vec<usize>,
    num_updates: u64,
}

impl Mean {
    pub fn new(n_data: usize, n_points_per_time: usize) -> Self {
        Self {
            data: vec![0.0; n_data],
            instance: vec![0.0; n_data],
            points_per_time: vec![n_points_per_time; n_data],
            num_updates: 0,
        }
    }
}

impl StreamData for Mean {
    type Datum = Real;

    fn fill(&mut self, instance_index: usize, _datum_index: usize, datum: Real) {
        if let (Some(instance), Some(&points)) = (
            self.instance.get_mut(instance_index),
            self.points_per_time.get(instance_index),
        ) {
            *instance += datum / points.max(1) as Real;
        }
    }

    fn data(&self, index: usize) -> Real {
        self.data.get(index).copied().unwrap_or_default()
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn update(&mut self) {
        let n = self.num_updates as Real;
        for (data, instance) in self.data.iter_mut().zip(self.instance.iter_mut()) {
            *data = (*data * n + *instance) / (n + 1.0);
            *instance = 0.0;
        }
        self.num_updates += 1;
    }

    fn clear(&mut self) {
        self.data.fill(0.0);
        self.instance.fill(0.0);
        self.num_updates = 0;
    }

    fn set_points_per_time(&mut self, index: usize, n_points: usize) {
        if let Some(points) = self.points_per_time.get_mut(index) {
            *points = n_points;
        }
    }
}
