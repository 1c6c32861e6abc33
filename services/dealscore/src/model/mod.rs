//! Win-probability model: trainer/predictor seams and a logistic regression

pub mod logistic;
pub mod metrics;

pub use logistic::*;
pub use metrics::*;

use crate::pipeline::{FeatureTable, Outcome, FEATURE_COLUMNS, OUTCOME_COLUMN};
use anyhow::{Context, Result};
use ndarray::{Array2, Axis};
use polars::prelude::*;

/// Dense feature matrix (rows = deals) with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            anyhow::bail!(
                "{} column names for a matrix with {} columns",
                columns.len(),
                values.ncols()
            );
        }
        Ok(Self { columns, values })
    }

    /// Model inputs from a feature table: every column except `outcome`.
    pub fn from_table(table: &FeatureTable) -> Result<Self> {
        let columns: Vec<String> = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        let mut values = Array2::<f64>::zeros((table.height(), columns.len()));

        for (name, mut target) in columns.iter().zip(values.axis_iter_mut(Axis(1))) {
            let series = table
                .frame
                .column(name)
                .with_context(|| format!("Feature column {} missing", name))?
                .cast(&DataType::Float64)?;
            for (cell, value) in target.iter_mut().zip(series.f64()?.into_iter()) {
                *cell = value.unwrap_or(0.0);
            }
        }

        Ok(Self { columns, values })
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Rows at the given indices, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }
}

/// Outcome labels from a feature table, row-aligned with [`FeatureMatrix::from_table`].
pub fn labels_from_table(table: &FeatureTable) -> Result<Vec<Outcome>> {
    let series = table
        .frame
        .column(OUTCOME_COLUMN)
        .context("Outcome column missing")?
        .cast(&DataType::Int64)?;
    series
        .i64()?
        .into_iter()
        .enumerate()
        .map(|(idx, label)| {
            label
                .and_then(Outcome::from_label)
                .with_context(|| format!("Row {} has invalid outcome {:?}", idx, label))
        })
        .collect()
}

/// Scores feature rows with a win probability in [0, 1].
pub trait Predictor {
    /// Feature columns the predictor expects, in order.
    fn feature_names(&self) -> &[String];

    fn predict_proba(&self, features: &FeatureMatrix) -> Result<Vec<f64>>;
}

/// Produces a predictor from labeled feature rows.
pub trait ModelTrainer {
    type Model: Predictor;

    fn train(&self, features: &FeatureMatrix, labels: &[Outcome]) -> Result<Self::Model>;
}
