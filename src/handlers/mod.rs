// src/handlers/mod.rs
pub mod chart;
pub mod dashboard;
pub mod error;
pub mod prices;
pub mod report;

use log::{error, warn};
use serde::Deserialize;
use warp::Rejection;

use crate::models::{normalize_ticker, PriceSeries, Window};
use crate::state::AppState;
use error::ApiError;

/// Query string shared by every stock endpoint: `?ticker=aapl&window=1mo`.
#[derive(Debug, Default, Deserialize)]
pub struct StockQuery {
    #[serde(default)]
    pub ticker: String,
    pub window: Option<String>,
}

impl StockQuery {
    pub fn resolve(&self) -> Result<(String, Window), Rejection> {
        let ticker = normalize_ticker(&self.ticker).map_err(|e| {
            warn!("Rejected ticker '{}': {}", self.ticker, e);
            warp::reject::custom(ApiError::bad_request(e.to_string()))
        })?;
        let window = match self.window.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw
                .parse::<Window>()
                .map_err(|e| warp::reject::custom(ApiError::bad_request(e.to_string())))?,
            _ => Window::default(),
        };
        Ok((ticker, window))
    }
}

/// Fetches through the memo cache; provider failures become a 502.
pub(crate) async fn load_series(state: &AppState, ticker: &str, window: Window) -> Result<PriceSeries, Rejection> {
    state.fetcher.fetch(ticker, window).await.map_err(|e| {
        error!("Failed to fetch {} ({}): {}", ticker, window, e);
        warp::reject::custom(ApiError::external_error(format!("Failed to fetch market data: {}", e)))
    })
}

pub(crate) fn no_data() -> Rejection {
    warp::reject::custom(ApiError::not_found("No data found for this ticker."))
}
