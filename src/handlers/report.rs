// src/handlers/report.rs
use chrono::NaiveDate;
use log::{error, info};
use serde::Serialize;
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use crate::models::{AnalysisErrorKind, AnalysisOutcome, Window};
use crate::services::chart::render_trend_chart;
use crate::state::AppState;
use super::error::ApiError;
use super::{load_series, no_data, StockQuery};

#[derive(Debug, Serialize)]
pub struct AnalysisBody {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<AnalysisErrorKind>,
    pub text: String,
}

impl From<AnalysisOutcome> for AnalysisBody {
    fn from(outcome: AnalysisOutcome) -> Self {
        let kind = match &outcome {
            AnalysisOutcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        };
        AnalysisBody {
            status: outcome.status(),
            kind,
            text: outcome.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReportResponse {
    ticker: String,
    window: Window,
    rows: usize,
    first_date: Option<NaiveDate>,
    last_date: Option<NaiveDate>,
    chart_svg: String,
    analysis: AnalysisBody,
}

/// Fetch, then chart, then analysis, in that order.
pub async fn get_report(query: StockQuery, state: Arc<AppState>) -> Result<Json, Rejection> {
    let (ticker, window) = query.resolve()?;
    info!("Handling report request for {} ({})", ticker, window);

    let series = load_series(&state, &ticker, window).await?;
    if series.is_empty() {
        info!("No data for {} ({})", ticker, window);
        return Err(no_data());
    }

    let chart_svg = render_trend_chart(&series, &ticker).map_err(|e| {
        error!("Failed to render chart for {}: {}", ticker, e);
        warp::reject::custom(ApiError::internal(e.to_string()))
    })?;

    let outcome = state.analyst.analyze(&series, &ticker).await;
    info!("Analysis for {} finished with status {}", ticker, outcome.status());

    Ok(warp::reply::json(&ReportResponse {
        rows: series.len(),
        first_date: series.first_date(),
        last_date: series.last_date(),
        ticker,
        window,
        chart_svg,
        analysis: outcome.into(),
    }))
}
