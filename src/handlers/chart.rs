// src/handlers/chart.rs
use log::{error, info};
use std::sync::Arc;
use warp::http::header::CONTENT_TYPE;
use warp::http::Response;
use warp::Rejection;

use crate::services::chart::render_trend_chart;
use crate::state::AppState;
use super::error::ApiError;
use super::{load_series, no_data, StockQuery};

pub async fn get_chart(query: StockQuery, state: Arc<AppState>) -> Result<Response<String>, Rejection> {
    let (ticker, window) = query.resolve()?;
    info!("Handling chart request for {} ({})", ticker, window);

    let series = load_series(&state, &ticker, window).await?;
    if series.is_empty() {
        return Err(no_data());
    }

    let svg = render_trend_chart(&series, &ticker).map_err(|e| {
        error!("Failed to render chart for {}: {}", ticker, e);
        warp::reject::custom(ApiError::internal(e.to_string()))
    })?;

    Response::builder()
        .header(CONTENT_TYPE, "image/svg+xml")
        .body(svg)
        .map_err(|e| warp::reject::custom(ApiError::internal(e.to_string())))
}
