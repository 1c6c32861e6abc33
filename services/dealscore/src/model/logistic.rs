//! L2-regularized logistic regression on standardized features

use crate::config::TrainingConfig;
use crate::model::metrics::{evaluate, Evaluation};
use crate::model::{FeatureMatrix, ModelTrainer, Predictor};
use crate::pipeline::Outcome;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Trained model. Serialized as JSON; the format is private to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub trained_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub means: Array1<f64>,
    pub stds: Array1<f64>,
    pub weights: Array1<f64>,
    pub bias: f64,
    pub training_samples: usize,
    #[serde(default)]
    pub holdout: Option<Evaluation>,
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

fn standardize(values: &Array2<f64>, means: &Array1<f64>, stds: &Array1<f64>) -> Array2<f64> {
    (values - means) / stds
}

/// Per-column mean and population standard deviation; constant columns get std 1.
fn column_stats(values: &Array2<f64>) -> (Array1<f64>, Array1<f64>) {
    let width = values.ncols();
    let means = values
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(width));
    let stds = values
        .std_axis(Axis(0), 0.0)
        .mapv(|s| if s.is_finite() && s >= 1e-12 { s } else { 1.0 });
    (means, stds)
}

impl LogisticModel {
    fn scores(&self, values: &Array2<f64>) -> Array1<f64> {
        let x = standardize(values, &self.means, &self.stds);
        (x.dot(&self.weights) + self.bias).mapv(sigmoid)
    }

    /// Write to `path` through a sibling temp file and a rename, so readers
    /// never observe a partial model.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {:?}", dir))?;
        }
        let bytes = serde_json::to_vec_pretty(self).context("Failed to serialize model")?;

        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, &bytes)
            .with_context(|| format!("Failed to write model to {:?}", tmp))?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                tracing::warn!("Failed to remove temp model {:?}: {}", tmp, cleanup);
            }
            return Err(e)
                .with_context(|| format!("Failed to move model into place at {:?}", path));
        }

        tracing::info!("Model saved to {:?}", path);
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Model file not found: {:?}. Run 'train' first.", path);
        }
        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read model from {:?}", path))?;
        let model: LogisticModel = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse model {:?}", path))?;
        if model.weights.len() != model.feature_names.len()
            || model.means.len() != model.feature_names.len()
            || model.stds.len() != model.feature_names.len()
        {
            anyhow::bail!("Model {:?} is inconsistent: parameter lengths differ", path);
        }
        Ok(model)
    }
}

impl Predictor for LogisticModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_proba(&self, features: &FeatureMatrix) -> Result<Vec<f64>> {
        if features.columns != self.feature_names {
            anyhow::bail!(
                "Feature columns {:?} do not match model columns {:?}",
                features.columns,
                self.feature_names
            );
        }
        Ok(self.scores(&features.values).to_vec())
    }
}

#[derive(Debug, Clone)]
pub struct LogisticTrainer {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for LogisticTrainer {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 500,
            l2: 0.001,
        }
    }
}

impl From<&TrainingConfig> for LogisticTrainer {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            learning_rate: config.learning_rate,
            epochs: config.epochs,
            l2: config.l2,
        }
    }
}

impl ModelTrainer for LogisticTrainer {
    type Model = LogisticModel;

    fn train(&self, features: &FeatureMatrix, labels: &[Outcome]) -> Result<LogisticModel> {
        if features.is_empty() {
            anyhow::bail!("Cannot train on an empty feature table");
        }
        if features.len() != labels.len() {
            anyhow::bail!(
                "Feature rows ({}) and labels ({}) differ in length",
                features.len(),
                labels.len()
            );
        }

        let (means, stds) = column_stats(&features.values);
        let x = standardize(&features.values, &means, &stds);
        let y: Array1<f64> = labels.iter().map(|l| l.label() as f64).collect();

        let n = x.nrows() as f64;
        let mut weights = Array1::<f64>::zeros(features.width());
        let mut bias = 0.0;

        for epoch in 0..self.epochs {
            let p = (x.dot(&weights) + bias).mapv(sigmoid);
            let err = &p - &y;

            let grad_w = x.t().dot(&err) / n + &weights * self.l2;
            let grad_b = err.sum() / n;
            weights.scaled_add(-self.learning_rate, &grad_w);
            bias -= self.learning_rate * grad_b;

            if epoch % 100 == 0 {
                let loss = -y
                    .iter()
                    .zip(p.iter())
                    .map(|(y, p)| y * p.max(1e-15).ln() + (1.0 - y) * (1.0 - p).max(1e-15).ln())
                    .sum::<f64>()
                    / n;
                tracing::debug!("epoch {}: log loss {:.5}", epoch, loss);
            }
        }

        Ok(LogisticModel {
            trained_at: Utc::now(),
            feature_names: features.columns.clone(),
            means,
            stds,
            weights,
            bias,
            training_samples: features.len(),
            holdout: None,
        })
    }
}

/// Seeded stratified split into (train, test) row indices. Each class sends
/// `test_fraction` of its rows (at least one) to the test side. Returns
/// `None` when a class has fewer than two rows.
pub fn stratified_split(
    labels: &[Outcome],
    test_fraction: f64,
    seed: u64,
) -> Option<(Vec<usize>, Vec<usize>)> {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [Outcome::Lost, Outcome::Won] {
        let mut idx: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, l)| **l == class)
            .map(|(i, _)| i)
            .collect();
        if idx.len() < 2 {
            return None;
        }
        rng.shuffle(&mut idx);
        let n_test = ((idx.len() as f64 * test_fraction).round() as usize).clamp(1, idx.len() - 1);
        test.extend_from_slice(&idx[..n_test]);
        train.extend_from_slice(&idx[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Some((train, test))
}

/// Train with a stratified holdout and record its metrics on the model.
/// Falls back to training on every row when the data is too small to split.
pub fn train_with_holdout<T>(
    trainer: &T,
    features: &FeatureMatrix,
    labels: &[Outcome],
    config: &TrainingConfig,
    threshold: f64,
) -> Result<LogisticModel>
where
    T: ModelTrainer<Model = LogisticModel>,
{
    let split = if config.test_fraction > 0.0 {
        stratified_split(labels, config.test_fraction, config.seed)
    } else {
        None
    };

    let Some((train_idx, test_idx)) = split else {
        tracing::warn!("Not enough rows per class for a holdout split; training on all {} rows", labels.len());
        return trainer.train(features, labels);
    };

    let train_labels: Vec<Outcome> = train_idx.iter().map(|&i| labels[i]).collect();
    let test_labels: Vec<Outcome> = test_idx.iter().map(|&i| labels[i]).collect();
    let mut model = trainer.train(&features.select(&train_idx), &train_labels)?;

    let probabilities = model.predict_proba(&features.select(&test_idx))?;
    let evaluation = evaluate(&test_labels, &probabilities, threshold);
    tracing::info!(
        "Holdout ({} rows): accuracy {:.4}, ROC-AUC {}, confusion {}",
        evaluation.samples,
        evaluation.accuracy,
        evaluation
            .roc_auc
            .map(|auc| format!("{:.4}", auc))
            .unwrap_or_else(|| "n/a".to_string()),
        evaluation.confusion
    );
    model.holdout = Some(evaluation);
    Ok(model)
}
