use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use presana::predict::train::{export, train, TrainingConfig};
use presana::predict::ModelArtifacts;
use presana::runtime::config::load_app_config;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "train_models")]
#[command(about = "Train linear and random-forest cost predictors on synthetic edge data")]
struct Args {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,
    #[arg(long, default_value_t = 500)]
    samples: usize,
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 5.0)]
    noise_std: f64,
    #[arg(long, default_value_t = 100)]
    trees: usize,
    #[arg(long, default_value_t = 8)]
    max_depth: usize,
    #[arg(long, default_value = "INFO")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let level = args.log_level.parse::<Level>()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .compact()
        .init();

    let cfg = load_app_config(args.config.as_deref())?;
    let artifacts = match args.artifacts_dir {
        Some(dir) => ModelArtifacts::in_dir(dir),
        None => cfg.models.clone(),
    };

    let training = TrainingConfig {
        samples: args.samples,
        seed: args.seed,
        target_weights: cfg.default_weights,
        noise_std: args.noise_std,
        n_trees: args.trees,
        max_depth: args.max_depth,
        ..TrainingConfig::default()
    };
    let models = train(&training)?;
    info!(
        "linear fit: w_distance={:.4} w_traffic={:.4} w_quality_inv={:.4} intercept={:.4}",
        models.linear.w_distance,
        models.linear.w_traffic,
        models.linear.w_quality_inv,
        models.linear.intercept
    );
    info!(
        "forest feature importances: {:?}",
        models.metadata.rf.feature_importances
    );
    export(&models, &artifacts)?;
    Ok(())
}
