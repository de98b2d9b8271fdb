use serde::{Deserialize, Serialize};

/// Deviations below this are treated as zero variance
const MIN_STD: f64 = 1e-12;

/// Per-feature running mean and variance (Welford)
///
/// Before the first observation the scaler is the identity transform. A
/// feature with zero observed variance is divided by 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunningScaler {
    count: u64,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl RunningScaler {
    pub fn new(dim: usize) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self, i: usize) -> f64 {
        self.mean.get(i).copied().unwrap_or(0.0)
    }

    /// Population standard deviation, 1.0 when undefined or degenerate
    pub fn std(&self, i: usize) -> f64 {
        if self.count == 0 {
            return 1.0;
        }
        let var = self.m2.get(i).copied().unwrap_or(0.0) / self.count as f64;
        let std = var.max(0.0).sqrt();
        if std < MIN_STD {
            1.0
        } else {
            std
        }
    }

    /// Folds one example into the running statistics
    pub fn observe(&mut self, values: &[f64]) {
        self.count += 1;
        let n = self.count as f64;
        for ((mean, m2), &x) in self.mean.iter_mut().zip(self.m2.iter_mut()).zip(values) {
            let delta = x - *mean;
            *mean += delta / n;
            *m2 += delta * (x - *mean);
        }
    }

    /// Standardizes `values` against the current statistics
    pub fn transform(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .enumerate()
            .map(|(i, &x)| (x - self.mean(i)) / self.std(i))
            .collect()
    }

    pub fn is_finite(&self) -> bool {
        self.mean.iter().chain(&self.m2).all(|v| v.is_finite())
    }
}
