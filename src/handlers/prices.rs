// src/handlers/prices.rs
use log::{error, info};
use serde::Serialize;
use std::sync::Arc;
use warp::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use warp::http::Response;
use warp::reply::Json;
use warp::Rejection;

use crate::models::{PriceSeries, Window};
use crate::services::export::series_to_csv;
use crate::state::AppState;
use super::error::ApiError;
use super::{load_series, StockQuery};

#[derive(Serialize)]
struct PricesResponse<'a> {
    ticker: &'a str,
    window: Window,
    rows: usize,
    series: &'a PriceSeries,
}

/// The fetched series as JSON. An unknown ticker is an empty list, not an error.
pub async fn get_prices(query: StockQuery, state: Arc<AppState>) -> Result<Json, Rejection> {
    let (ticker, window) = query.resolve()?;
    info!("Handling request to get prices for {} ({})", ticker, window);

    let series = load_series(&state, &ticker, window).await?;
    Ok(warp::reply::json(&PricesResponse {
        ticker: &ticker,
        window,
        rows: series.len(),
        series: &series,
    }))
}

pub async fn get_prices_csv(query: StockQuery, state: Arc<AppState>) -> Result<Response<String>, Rejection> {
    let (ticker, window) = query.resolve()?;
    info!("Handling CSV export for {} ({})", ticker, window);

    let series = load_series(&state, &ticker, window).await?;
    let body = series_to_csv(&series).map_err(|e| {
        error!("Failed to write CSV for {}: {}", ticker, e);
        warp::reject::custom(ApiError::internal(e.to_string()))
    })?;

    Response::builder()
        .header(CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}_{}.csv\"", ticker, window),
        )
        .body(body)
        .map_err(|e| warp::reject::custom(ApiError::internal(e.to_string())))
}
