//! Deal scoring CLI
//!
//! Usage:
//!   dealscore features --won data/won_deals.json --lost data/lost_deals.json --activities data/activities.json
//!   dealscore train --config config/dealscore.toml
//!   dealscore predict --model models/deal_model.json --output predictions.csv
//!   dealscore run-all --config config/dealscore.toml

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use dealscore::config::Config;
use dealscore::model::{
    labels_from_table, train_with_holdout, FeatureMatrix, LogisticModel, LogisticTrainer,
};
use dealscore::outputs::{predict_deals, write_feature_table, write_predictions};
use dealscore::pipeline::{run_pipeline, PipelineOutput};

#[derive(Parser)]
#[command(name = "dealscore")]
#[command(about = "Deal/activity feature extraction and win-probability scoring")]
struct Cli {
    /// TOML config; built-in defaults are used when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct InputArgs {
    #[arg(long)]
    won: Option<PathBuf>,
    #[arg(long)]
    lost: Option<PathBuf>,
    #[arg(long)]
    activities: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the feature table and write it to CSV or Parquet
    Features {
        #[command(flatten)]
        inputs: InputArgs,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Train the win-probability model and save it
    Train {
        #[command(flatten)]
        inputs: InputArgs,
        #[arg(long)]
        model: Option<PathBuf>,
    },
    /// Score every deal with a saved model
    Predict {
        #[command(flatten)]
        inputs: InputArgs,
        #[arg(long)]
        model: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Features, then train, then predict
    RunAll {
        #[command(flatten)]
        inputs: InputArgs,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(p) => Config::load(p),
        None => Ok(Config::default()),
    }
}

fn apply_inputs(config: &mut Config, inputs: InputArgs) {
    if let Some(won) = inputs.won {
        config.inputs.won_deals = won;
    }
    if let Some(lost) = inputs.lost {
        config.inputs.lost_deals = lost;
    }
    if let Some(activities) = inputs.activities {
        config.inputs.activities = activities;
    }
}

fn build(config: &Config) -> Result<PipelineOutput> {
    for path in [
        &config.inputs.won_deals,
        &config.inputs.lost_deals,
        &config.inputs.activities,
    ] {
        if !path.exists() {
            anyhow::bail!("Input file not found: {:?}", path);
        }
    }
    run_pipeline(
        &config.inputs.won_deals,
        &config.inputs.lost_deals,
        &config.inputs.activities,
    )
}

fn run_features_command(config: &Config, output: &PipelineOutput) -> Result<()> {
    write_feature_table(&config.outputs.features, &output.table)?;

    let report = &output.report;
    println!("\n=== Feature Summary ===");
    println!("Deals: {}", report.deals);
    println!("Deals without activities: {}", report.deals_without_activities);
    println!("Activities kept: {}/{}", report.activities_kept, report.activities_in);
    println!("Dropped (no deal_id): {}", report.dropped.missing_deal_id);
    println!("Dropped (bad timestamp): {}", report.dropped.bad_timestamp);
    println!("Orphaned activities: {}", report.orphaned_activities);
    println!("Unknown activity types: {}", report.unknown_activity_types);
    println!("Feature columns: {:?}", output.table.column_names());

    Ok(())
}

fn run_train_command(config: &Config, output: &PipelineOutput) -> Result<LogisticModel> {
    let features = FeatureMatrix::from_table(&output.table)?;
    let labels = labels_from_table(&output.table)?;

    let trainer = LogisticTrainer::from(&config.training);
    let model = train_with_holdout(
        &trainer,
        &features,
        &labels,
        &config.training,
        config.scoring.threshold,
    )?;
    model.save(&config.outputs.model)?;

    println!("\n=== Training Summary ===");
    println!("Training rows: {}", model.training_samples);
    if let Some(holdout) = &model.holdout {
        println!("Test accuracy: {:.4}", holdout.accuracy);
        match holdout.roc_auc {
            Some(auc) => println!("Test ROC-AUC: {:.4}", auc),
            None => println!("Test ROC-AUC: n/a (single class)"),
        }
        println!("Confusion matrix: {}", holdout.confusion);
    }
    let mut weights: Vec<_> = model.feature_names.iter().zip(&model.weights).collect();
    weights.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    println!("Top features:");
    for (name, weight) in weights {
        println!("  {:<24} {:+.4}", name, weight);
    }

    Ok(model)
}

fn run_predict_command(config: &Config, output: &PipelineOutput) -> Result<()> {
    let model = LogisticModel::load(&config.outputs.model)?;

    let predictions = predict_deals(&model, &output.table, config.scoring.threshold)?;
    write_predictions(&config.outputs.predictions, &predictions)?;

    for p in predictions.iter().take(5) {
        println!(
            "{} | P(won)={:.3} | prediction={}",
            p.deal_id, p.won_probability, p.won_prediction
        );
    }
    println!("Predictions saved to {:?}", config.outputs.predictions);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Features { inputs, output } => {
            apply_inputs(&mut config, inputs);
            if let Some(output) = output {
                config.outputs.features = output;
            }
            run_features_command(&config, &build(&config)?)?;
        }
        Commands::Train { inputs, model } => {
            apply_inputs(&mut config, inputs);
            if let Some(model) = model {
                config.outputs.model = model;
            }
            run_train_command(&config, &build(&config)?)?;
        }
        Commands::Predict { inputs, model, output, threshold } => {
            apply_inputs(&mut config, inputs);
            if let Some(model) = model {
                config.outputs.model = model;
            }
            if let Some(output) = output {
                config.outputs.predictions = output;
            }
            if let Some(threshold) = threshold {
                config.scoring.threshold = threshold;
            }
            config.validate()?;
            run_predict_command(&config, &build(&config)?)?;
        }
        Commands::RunAll { inputs } => {
            apply_inputs(&mut config, inputs);
            tracing::info!("Running full pipeline");
            let output = build(&config)?;
            run_features_command(&config, &output)?;
            run_train_command(&config, &output)?;
            run_predict_command(&config, &output)?;
        }
    }

    Ok(())
}
