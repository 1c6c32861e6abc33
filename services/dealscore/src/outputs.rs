//! Output writing for feature tables and predictions (CSV and Parquet)

use crate::model::{classify, FeatureMatrix, Predictor};
use crate::pipeline::FeatureTable;
use anyhow::{Context, Result};
use polars::prelude::*;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Win probability and thresholded call for one deal.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub deal_id: String,
    pub won_probability: f64,
    pub won_prediction: i32,
}

/// Score every deal in the table, in table order.
pub fn predict_deals(
    predictor: &dyn Predictor,
    table: &FeatureTable,
    threshold: f64,
) -> Result<Vec<Prediction>> {
    let features = FeatureMatrix::from_table(table)?;
    if predictor.feature_names() != features.columns.as_slice() {
        anyhow::bail!(
            "Model expects columns {:?}, feature table has {:?}",
            predictor.feature_names(),
            features.columns
        );
    }
    let probabilities = predictor.predict_proba(&features)?;
    if probabilities.len() != table.deal_ids.len() {
        anyhow::bail!(
            "Predictor returned {} scores for {} deals",
            probabilities.len(),
            table.deal_ids.len()
        );
    }
    let calls = classify(&probabilities, threshold);

    Ok(table
        .deal_ids
        .iter()
        .zip(probabilities)
        .zip(calls)
        .map(|((deal_id, won_probability), call)| Prediction {
            deal_id: deal_id.clone(),
            won_probability,
            won_prediction: call.label(),
        })
        .collect())
}

pub fn predictions_frame(predictions: &[Prediction]) -> Result<DataFrame> {
    let deal_id_col: Vec<&str> = predictions.iter().map(|p| p.deal_id.as_str()).collect();
    let probability_col: Vec<f64> = predictions.iter().map(|p| p.won_probability).collect();
    let prediction_col: Vec<i32> = predictions.iter().map(|p| p.won_prediction).collect();

    let df = DataFrame::new(vec![
        Series::new("deal_id", deal_id_col),
        Series::new("won_probability", probability_col),
        Series::new("won_prediction", prediction_col),
    ])?;
    Ok(df)
}

/// Serialize a frame as CSV, or Parquet when the path ends in `.parquet`.
fn encode_frame(path: &Path, df: &DataFrame) -> Result<Vec<u8>> {
    let mut df = df.clone();
    let mut buf = Vec::new();
    if path.extension().and_then(|s| s.to_str()) == Some("parquet") {
        ParquetWriter::new(&mut buf)
            .finish(&mut df)
            .context("Failed to encode Parquet")?;
    } else {
        CsvWriter::new(&mut buf)
            .include_header(true)
            .finish(&mut df)
            .context("Failed to encode CSV")?;
    }
    Ok(buf)
}

/// Write a frame and return the SHA-256 of the written bytes.
pub fn write_frame<P: AsRef<Path>>(path: P, df: &DataFrame) -> Result<String> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {:?}", dir))?;
    }

    let bytes = encode_frame(path, df)?;
    std::fs::write(path, &bytes).with_context(|| format!("Failed to write {:?}", path))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn write_feature_table<P: AsRef<Path>>(path: P, table: &FeatureTable) -> Result<String> {
    let digest = write_frame(path.as_ref(), &table.frame)?;
    tracing::info!(
        "Wrote {} feature rows to {:?} (sha256 {})",
        table.height(),
        path.as_ref(),
        digest
    );
    Ok(digest)
}

pub fn write_predictions<P: AsRef<Path>>(path: P, predictions: &[Prediction]) -> Result<String> {
    let df = predictions_frame(predictions)?;
    let digest = write_frame(path.as_ref(), &df)?;
    tracing::info!(
        "Wrote {} predictions to {:?} (sha256 {})",
        predictions.len(),
        path.as_ref(),
        digest
    );
    Ok(digest)
}
