//! Fixed-capacity moving average used to smooth each ADC channel.
use crate::error::WindowError;
use std::collections::VecDeque;

/// Upper bound on the storage reserved up front; larger windows grow on demand.
const PREALLOCATED_SAMPLES: usize = 64;

/// A simple moving average over the most recent `capacity` samples.
///
/// A capacity of 1 turns smoothing off: [`mean`](Self::mean) hands back the
/// latest sample unchanged.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    buffer: VecDeque<f64>,
}

impl RollingWindow {
    /// Create an empty window. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            buffer: VecDeque::with_capacity(capacity.min(PREALLOCATED_SAMPLES)),
        }
    }

    /// Build a window from a configured sample count, where zero or negative
    /// counts mean "no smoothing".
    pub fn from_sample_count(samples: i64) -> Self {
        Self::new(usize::try_from(samples).unwrap_or(1))
    }

    /// Append a sample, evicting the oldest once full.
    pub fn push(&mut self, value: f64) {
        self.buffer.push_back(value);
        if self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
    }

    /// Arithmetic mean of the current contents.
    pub fn mean(&self) -> Result<f64, WindowError> {
        if self.capacity == 1 {
            return self.buffer.back().copied().ok_or(WindowError::Empty);
        }
        if self.buffer.is_empty() {
            return Err(WindowError::Empty);
        }

        let sum: f64 = self.buffer.iter().sum();
        Ok(sum / self.buffer.len() as f64)
    }

    /// Maximum number of samples averaged.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples currently held.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether no sample has been pushed since creation or the last clear.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop every sample.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
