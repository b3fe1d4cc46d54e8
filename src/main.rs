// src/main.rs
use anyhow::{Context, Result};
use log::{info, warn};
use std::time::Instant;

use city_distances_lib::{PipelineConfig, PostgrestStore, pipeline};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Variables already in the environment win over the .env file
    match dotenv::dotenv() {
        Ok(path) => info!("Loaded environment variables from {}", path.display()),
        Err(_) => info!("No .env file found, using environment variables from system"),
    }

    let config = PipelineConfig::from_env().context("Invalid configuration")?;
    let store = PostgrestStore::new(&config);

    info!("Starting city distance calculation");
    let start_time = Instant::now();

    let summary = pipeline::run(&config, &store).await?;

    for warning in &summary.writes.warnings {
        warn!("{}", warning);
    }
    for line in summary.to_string().lines() {
        info!("{}", line);
    }
    info!("Done in {:.2?}.", start_time.elapsed());

    Ok(())
}
