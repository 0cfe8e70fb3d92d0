// src/bin/test_yahoo.rs
use dotenv::dotenv;
use log::{error, info};
use std::env;

use neural_ticker::models::{normalize_ticker, Window};
use neural_ticker::services::analysis::format_table;
use neural_ticker::services::market_data::QuoteProvider;
use neural_ticker::services::yahoo::YahooClient;
use neural_ticker::AppConfig;

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
    let client = YahooClient::new(config.yahoo_base_url, config.yahoo_auto_adjust)?;

    info!("Testing Yahoo Finance history for {} ({})...", ticker, window);
    match client.history(&ticker, window).await {
        Ok(series) if series.is_empty() => {
            error!("No data found for {}", ticker);
        }
        Ok(series) => {
            info!(
                "SUCCESS: {} rows from {:?} to {:?}",
                series.len(),
                series.first_date(),
                series.last_date()
            );
            println!("{}", format_table(series.bars()));
        }
        Err(e) => {
            error!("ERROR: Failed to fetch Yahoo Finance history: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
