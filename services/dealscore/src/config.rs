use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub inputs: InputsConfig,
    #[serde(default)]
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputsConfig {
    #[serde(default = "default_won_deals")]
    pub won_deals: PathBuf,
    #[serde(default = "default_lost_deals")]
    pub lost_deals: PathBuf,
    #[serde(default = "default_activities")]
    pub activities: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputsConfig {
    #[serde(default = "default_features")]
    pub features: PathBuf,
    #[serde(default = "default_predictions")]
    pub predictions: PathBuf,
    #[serde(default = "default_model")]
    pub model: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_l2")]
    pub l2: f64,
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_threshold")]
    pub threshold: f64,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config from {:?}", path.as_ref()))?;
        let config: Config = toml::from_str(&content)
            .context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.training.test_fraction) {
            anyhow::bail!(
                "training.test_fraction must be in [0, 1), got {}",
                self.training.test_fraction
            );
        }
        if !(0.0..=1.0).contains(&self.scoring.threshold) {
            anyhow::bail!(
                "scoring.threshold must be in [0, 1], got {}",
                self.scoring.threshold
            );
        }
        if self.training.learning_rate <= 0.0 {
            anyhow::bail!("training.learning_rate must be positive");
        }
        Ok(())
    }
}

impl Default for InputsConfig {
    fn default() -> Self {
        Self {
            won_deals: default_won_deals(),
            lost_deals: default_lost_deals(),
            activities: default_activities(),
        }
    }
}

impl Default for OutputsConfig {
    fn default() -> Self {
        Self {
            features: default_features(),
            predictions: default_predictions(),
            model: default_model(),
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: default_learning_rate(),
            epochs: default_epochs(),
            l2: default_l2(),
            test_fraction: default_test_fraction(),
            seed: default_seed(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
        }
    }
}

fn default_won_deals() -> PathBuf {
    PathBuf::from("data/won_deals.json")
}

fn default_lost_deals() -> PathBuf {
    PathBuf::from("data/lost_deals.json")
}

fn default_activities() -> PathBuf {
    PathBuf::from("data/activities.json")
}

fn default_features() -> PathBuf {
    PathBuf::from("data/features.csv")
}

fn default_predictions() -> PathBuf {
    PathBuf::from("predictions.csv")
}

fn default_model() -> PathBuf {
    PathBuf::from("models/deal_model.json")
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_epochs() -> usize {
    500
}

fn default_l2() -> f64 {
    0.001
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_threshold() -> f64 {
    0.5
}
