// src/bin/test_ollama.rs
use dotenv::dotenv;
use log::{error, info};
use std::env;

use neural_ticker::models::{normalize_ticker, AnalysisOutcome, Window};
use neural_ticker::services::analysis::build_prompt;
use neural_ticker::{AppConfig, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let mut args = env::args().skip(1);
    let ticker = normalize_ticker(&args.next().unwrap_or_else(|| "AAPL".to_string()))?;
    let window: Window = match args.next() {
        Some(raw) => raw.parse()?,
        None => Window::default(),
    };

    let config = AppConfig::from_env()?;
    let state = AppState::from_config(&config)?;

    let series = state.fetcher.fetch(&ticker, window).await?;
    if series.is_empty() {
        error!("No data found for {}", ticker);
        return Ok(());
    }

    println!("--- prompt ---\n{}", build_prompt(&series, &ticker));

    info!("Asking {} at {} ...", state.analyst.model(), config.ollama_host);
    let outcome = state.analyst.analyze(&series, &ticker).await;
    if let AnalysisOutcome::Failed { kind, .. } = &outcome {
        error!("Analysis failed ({:?})", kind);
    }
    println!("--- analysis ---\n{}", outcome);

    Ok(())
}
