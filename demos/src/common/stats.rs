use std::fmt;

use burn::{prelude::*, tensor::cast::ToElement};

/// Min, max and mean of one tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
}

impl TensorStats {
    pub fn of<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Self {
        Self {
            min: tensor.clone().min().into_scalar().to_f32(),
            max: tensor.clone().max().into_scalar().to_f32(),
            mean: tensor.mean().into_scalar().to_f32(),
        }
    }
}

impl fmt::Display for TensorStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "min={:.4}, max={:.4}, mean={:.4}",
            self.min, self.max, self.mean
        )
    }
}

/// Per-batch [`TensorStats`] collected over a run.
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    batches: Vec<TensorStats>,
}

impl RunningStats {
    pub fn push(&mut self, stats: TensorStats) {
        self.batches.push(stats);
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Smallest and largest value seen in any batch.
    pub fn extremes(&self) -> Option<(f32, f32)> {
        self.batches.iter().fold(None, |acc, s| match acc {
            None => Some((s.min, s.max)),
            Some((lo, hi)) => Some((f32::min(lo, s.min), f32::max(hi, s.max))),
        })
    }

    /// Batch-averaged min, max and mean.
    pub fn average(&self) -> Option<TensorStats> {
        if self.batches.is_empty() {
            return None;
        }
        let n = self.batches.len() as f32;
        let sum = self.batches.iter().fold((0.0, 0.0, 0.0), |(a, b, c), s| {
            (a + s.min, b + s.max, c + s.mean)
        });
        Some(TensorStats {
            min: sum.0 / n,
            max: sum.1 / n,
            mean: sum.2 / n,
        })
    }
}
