//! Online URL-relevance model
//!
//! A logistic regression trained one example at a time with SGD on log-loss,
//! over features standardized by a running scaler. Weights and scaler live in
//! one value so they are always updated and persisted together.
//!
//! # Scaling rule
//!
//! `update` first folds the example into the scaler statistics, then
//! re-expresses the weights against the new statistics so the raw-space
//! decision function is unchanged, and only then takes the gradient step on
//! the freshly scaled example. `score` applies the same statistics, so the two
//! never disagree about how a feature is scaled.

mod features;
mod scaler;
mod snapshot;

pub use features::{link_features, FeatureVector, FEATURE_NAMES};
pub use scaler::RunningScaler;
pub use snapshot::{write_atomic, SNAPSHOT_FORMAT, SNAPSHOT_VERSION};

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Relevance model errors
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to load model snapshot: {0}")]
    LoadFailed(String),

    #[error("Failed to persist model snapshot: {0}")]
    PersistFailed(String),

    #[error("Feature layout mismatch: expected {expected} signals, got {found}")]
    LayoutMismatch { expected: usize, found: usize },

    #[error("Model parameters diverged: {0}")]
    Diverged(String),
}

/// Prior weights over the raw default features, in `FEATURE_NAMES` order
const PRIOR_WEIGHTS: [f64; 9] = [0.1, 0.2, 0.1, 0.2, 0.5, -0.05, 0.0, -0.2, -1.0];

const DEFAULT_LEARNING_RATE: f64 = 0.1;

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Online logistic relevance model with its feature scaler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelevanceModel {
    feature_names: Vec<String>,
    weights: Vec<f64>,
    bias: f64,
    scaler: RunningScaler,
    learning_rate: f64,
    updates: u64,
}

impl Default for RelevanceModel {
    fn default() -> Self {
        Self::with_learning_rate(DEFAULT_LEARNING_RATE)
    }
}

impl RelevanceModel {
    /// Fresh model over the default layout, seeded with the keyword prior
    pub fn with_learning_rate(learning_rate: f64) -> Self {
        Self::with_layout(
            FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            PRIOR_WEIGHTS.to_vec(),
            0.0,
            learning_rate,
        )
    }

    /// Fresh model over a custom feature layout
    ///
    /// Missing weights are zero; extra weights are dropped.
    pub fn with_layout(
        feature_names: Vec<String>,
        mut weights: Vec<f64>,
        bias: f64,
        learning_rate: f64,
    ) -> Self {
        weights.resize(feature_names.len(), 0.0);
        let dim = feature_names.len();
        Self {
            feature_names,
            weights,
            bias,
            scaler: RunningScaler::new(dim),
            learning_rate,
            updates: 0,
        }
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    pub fn scaler(&self) -> &RunningScaler {
        &self.scaler
    }

    /// Relevance in (0, 1); pure and deterministic
    ///
    /// Signals beyond the model's layout are ignored.
    pub fn score(&self, features: &FeatureVector) -> f64 {
        let raw: Vec<f64> = features.values().collect();
        sigmoid(self.logit(&self.scaler.transform(&raw)))
    }

    fn logit(&self, scaled: &[f64]) -> f64 {
        self.bias
            + self
                .weights
                .iter()
                .zip(scaled)
                .map(|(w, s)| w * s)
                .sum::<f64>()
    }

    /// One incremental training step toward `label` (clamped to [0, 1])
    pub fn update(&mut self, features: &FeatureVector, label: f64) -> Result<(), ModelError> {
        if !features.has_layout(&self.feature_names) {
            return Err(ModelError::LayoutMismatch {
                expected: self.feature_names.len(),
                found: features.len(),
            });
        }

        let label = if label.is_finite() {
            label.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let raw: Vec<f64> = features.values().collect();

        let previous = self.scaler.clone();
        self.scaler.observe(&raw);

        for (i, w) in self.weights.iter_mut().enumerate() {
            let (old_std, new_std) = (previous.std(i), self.scaler.std(i));
            self.bias += (*w / old_std) * (self.scaler.mean(i) - previous.mean(i));
            *w *= new_std / old_std;
        }

        let scaled = self.scaler.transform(&raw);
        let gradient = sigmoid(self.logit(&scaled)) - label;
        for (w, s) in self.weights.iter_mut().zip(&scaled) {
            *w -= self.learning_rate * gradient * s;
        }
        self.bias -= self.learning_rate * gradient;
        self.updates += 1;

        self.check_finite()
    }

    fn check_finite(&self) -> Result<(), ModelError> {
        let finite = self.bias.is_finite()
            && self.weights.iter().all(|w| w.is_finite())
            && self.scaler.is_finite();
        if finite {
            Ok(())
        } else {
            Err(ModelError::Diverged(format!(
                "non-finite parameters after {} updates",
                self.updates
            )))
        }
    }

    /// Internal consistency check applied to loaded snapshots
    fn validate(&self) -> Result<(), ModelError> {
        let dim = self.feature_names.len();
        if self.weights.len() != dim || self.scaler.dim() != dim {
            return Err(ModelError::LoadFailed(format!(
                "inconsistent dimensions: {} names, {} weights, {} scaler columns",
                dim,
                self.weights.len(),
                self.scaler.dim()
            )));
        }
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ModelError::LoadFailed(format!(
                "invalid learning rate {}",
                self.learning_rate
            )));
        }
        self.check_finite()
            .map_err(|e| ModelError::LoadFailed(e.to_string()))
    }

    /// Writes weights and scaler as one snapshot, atomically
    pub fn persist(&self, path: &Path) -> Result<(), ModelError> {
        snapshot::save(self, path)
    }

    /// Reads a snapshot, rejecting corrupt or incompatible files
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let model = snapshot::load(path)?;
        model.validate()?;
        Ok(model)
    }

    /// Reads a snapshot whose layout matches `expected`, falling back to `fallback`
    ///
    /// A missing file is silent; any other failure is logged as a warning.
    pub fn load_or(path: &Path, fallback: Self) -> Self {
        if !path.exists() {
            tracing::info!("No model snapshot at {}, starting fresh", path.display());
            return fallback;
        }

        match Self::load(path) {
            Ok(model) if model.feature_names == fallback.feature_names => {
                tracing::info!(
                    "Loaded model snapshot with {} prior updates",
                    model.updates
                );
                model
            }
            Ok(_) => {
                tracing::warn!(
                    "Model snapshot {} has a different feature layout, starting fresh",
                    path.display()
                );
                fallback
            }
            Err(e) => {
                tracing::warn!("{}; starting with a fresh model", e);
                fallback
            }
        }
    }

    /// `load_or` with the default model
    pub fn load_or_default(path: &Path) -> Self {
        Self::load_or(path, Self::default())
    }
}
