// src/main.rs

use anyhow::Result;
use gaitcycle::pipeline::{find_trial_files, process_trial, write_diagnostics};
use gaitcycle::Config;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn load_config() -> Result<Config> {
    let path = std::env::var("GAIT_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    if Path::new(&path).exists() {
        Config::load(&path)
    } else {
        Ok(Config::default())
    }
}

fn main() -> Result<()> {
    let config = load_config()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gaitcycle={}", config.logging.level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Gait cycle batch starting");
    info!(
        "Thresholds: strike={:.2}, toeoff={:.2} of peak speed, tolerance={} frames",
        config.velocity.strike_fraction, config.velocity.toeoff_fraction, config.reconcile.tolerance_frames
    );

    let trials = find_trial_files(&config.batch.input_dir)?;
    if trials.is_empty() {
        warn!("No trial files found in {}", config.batch.input_dir);
        return Ok(());
    }

    let out_dir = Path::new(&config.batch.output_dir);
    let mut processed = 0;
    let mut failed = 0;

    for (idx, path) in trials.iter().enumerate() {
        info!("Processing trial {}/{}: {}", idx + 1, trials.len(), path.display());

        match process_trial(path, &config) {
            Ok(diag) => {
                diag.log_summary();
                if config.batch.write_diagnostics {
                    match write_diagnostics(&diag, out_dir) {
                        Ok(written) => info!("  diagnostics: {}", written.display()),
                        Err(e) => error!("  {:#}", e),
                    }
                }
                processed += 1;
            }
            Err(e) => {
                error!("Failed to process trial: {:#}", e);
                failed += 1;
            }
        }
    }

    info!("Done: {} trials processed, {} failed", processed, failed);
    Ok(())
}
