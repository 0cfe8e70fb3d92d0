// src/bin/render_chart.rs
use anyhow::bail;
use dotenv::dotenv;
use log::info;
use std::{env, fs};

use neural_ticker::models::{normalize_ticker, Window};
use neural_ticker::services::chart::render_trend_chart;
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
    let out = args
        .next()
        .unwrap_or_else(|| format!("{}_{}.svg", ticker.to_lowercase(), window));

    let state = AppState::from_config(&AppConfig::from_env()?)?;
    let series = state.fetcher.fetch(&ticker, window).await?;
    if series.is_empty() {
        bail!("No data found for {}", ticker);
    }

    let svg = render_trend_chart(&series, &ticker)?;
    fs::write(&out, svg)?;
    info!("Wrote {} points to {}", series.len(), out);
    println!("{}", out);

    Ok(())
}
