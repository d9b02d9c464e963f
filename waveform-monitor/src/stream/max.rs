use super::StreamData;

/// Largest value seen in each slot since the last clear.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Max<T> {
    data: Vec<T>,
}

impl<T: Copy + Default> Max<T> {
    pub fn new(n_data: usize) -> Self {
        Self {
            data: vec![T::default(); n_data],
        }
    }
}

impl<T: Copy + Default + PartialOrd> StreamData for Max<T> {
    type Datum = T;

    fn fill(&mut self, instance_index: usize, _datum_index: usize, datum: T) {
        if let Some(data) = self.data.get_mut(instance_index) {
            if *data < datum {
                *data = datum;
            }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_largest() {
        let mut max = Max::<u32>::new(2);
        for value in [3, 9, 4] {
            max.fill(1, 0, value);
        }
        max.update();
        max.fill(1, 0, 5);
        assert_eq!(max.data(1), 9);
        assert_eq!(max.data(0), 0);
    }

    #[test]
    fn clear_resets() {
        let mut max = Max::<i16>::new(1);
        max.fill(0, 0, 300);
        max.clear();
        assert_eq!(max.data(0), 0);
    }
}
