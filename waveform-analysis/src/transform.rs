use crate::Real;
use rustfft::{Fft, FftPlanner, num_complex::Complex64};
use std::{fmt, sync::Arc};

/// A reusable forward transform of real input.
///
/// The plan and buffers are kept between calls and only rebuilt when the
/// input size changes. A context must not be shared between threads while in
/// use; parallel callers hold one each.
pub struct TransformContext {
    input_size: usize,
    fft: Option<Arc<dyn Fft<Real>>>,
    buffer: Vec<Complex64>,
    scratch: Vec<Complex64>,
    num_plans: usize,
}

impl fmt::Debug for TransformContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformContext")
            .field("input_size", &self.input_size)
            .finish()
    }
}

impl Default for TransformContext {
    fn default() -> Self {
        Self::new(0)
    }
}

impl TransformContext {
    pub fn new(input_size: usize) -> Self {
        let mut context = Self {
            input_size: 0,
            fft: None,
            buffer: Vec::new(),
            scratch: Vec::new(),
            num_plans: 0,
        };
        context.set(input_size);
        context
    }

    /// Resizes the context. Does nothing if `input_size` is unchanged.
    pub fn set(&mut self, input_size: usize) {
        if input_size == self.input_size && (self.fft.is_some() || input_size == 0) {
            return;
        }
        self.input_size = input_size;
        if input_size == 0 {
            self.fft = None;
            self.buffer.clear();
            self.scratch.clear();
            return;
        }
        let fft = FftPlanner::new().plan_fft_forward(input_size);
        self.buffer.clear();
        self.buffer.resize(input_size, Complex64::default());
        self.scratch.clear();
        self.scratch
            .resize(fft.get_inplace_scratch_len(), Complex64::default());
        self.fft = Some(fft);
        self.num_plans += 1;
    }

    /// Number of times a transform has been planned over the life of the context.
    pub fn num_plans(&self) -> usize {
        self.num_plans
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Number of non-redundant output bins, `input_size / 2 + 1`.
    pub fn output_size(&self) -> usize {
        if self.input_size == 0 {
            0
        } else {
            self.input_size / 2 + 1
        }
    }

    /// Writes one input value. Indices beyond the input size are ignored.
    pub fn input_at(&mut self, index: usize, value: Real) {
        if let Some(slot) = self.buffer.get_mut(index) {
            *slot = Complex64::new(value, 0.0);
        }
    }

    /// Resizes to the length of `values` and writes them as the input.
    pub fn load(&mut self, values: impl ExactSizeIterator<Item = Real>) {
        self.set(values.len());
        for (slot, value) in self.buffer.iter_mut().zip(values) {
            *slot = Complex64::new(value, 0.0);
        }
    }

    /// Transforms the input in place. The input must be rewritten before the next call.
    pub fn execute(&mut self) {
        if let Some(fft) = &self.fft {
            fft.process_with_scratch(&mut self.buffer, &mut self.scratch);
        }
    }

    fn output_at(&self, index: usize) -> Complex64 {
        if index < self.output_size() {
            self.buffer.get(index).copied().unwrap_or_default()
        } else {
            Complex64::default()
        }
    }

    pub fn real_at(&self, index: usize) -> Real {
        self.output_at(index).re
    }

    pub fn imag_at(&self, index: usize) -> Real {
        self.output_at(index).im
    }

    pub fn abs_at(&self, index: usize) -> Real {
        self.output_at(index).norm()
    }
}
