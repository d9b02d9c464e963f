use super::StreamData;
use std::ops::AddAssign;

/// Total of the values added to each slot since the last clear.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sum<T> {
    data: Vec<T>,
}

impl<T: Copy + Default> Sum<T> {
    pub fn new(n_data: usize) -> Self {
        Self {
            data: vec![T::default(); n_data],
        }
    }
}

impl<T: Copy + Default + AddAssign> StreamData for Sum<T> {
    type Datum = T;

    fn fill(&mut self, instance_index: usize, _datum_index: usize, datum: T) {
        if let Some(data) = self.data.get_mut(instance_index) {
            *data += datum;
        }
    }

    fn data(&self, index: usize) -> T {
        self.data.get(index).copied().unwrap_or_default()
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn update(&mut self) {}

    fn clear(&mut self) {
        self.data.fill(T::default());
    }

    fn set_points_per_time(&mut self, _index: usize, _n_points: usize) {}
}
