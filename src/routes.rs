// src/routes.rs
use std::convert::Infallible;
use std::sync::Arc;
use log::{info, warn};
use warp::http::StatusCode;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::chart::get_chart;
use crate::handlers::dashboard::get_dashboard;
use crate::handlers::error::ApiError;
use crate::handlers::prices::{get_prices, get_prices_csv};
use crate::handlers::report::get_report;
use crate::handlers::StockQuery;
use crate::state::AppState;

// Turn rejections into JSON error bodies
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "Not Found";
    } else if let Some(api_error) = err.find::<ApiError>() {
        code = api_error.status;
        message = api_error.message.as_str();
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        code = StatusCode::BAD_REQUEST;
        message = "Invalid query string";
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        code = StatusCode::METHOD_NOT_ALLOWED;
        message = "Method Not Allowed";
    } else {
        warn!("Unhandled rejection: {:?}", err);
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "Internal Server Error";
    }

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error": message,
        })),
        code,
    ))
}

pub fn routes(state: Arc<AppState>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let state_filter = warp::any().map(move || state.clone());

    let dashboard_route = warp::path::end()
        .and(warp::get())
        .and_then(get_dashboard);

    let report_route = warp::path!("api" / "v1" / "report")
        .and(warp::get())
        .and(warp::query::<StockQuery>())
        .and(state_filter.clone())
        .and_then(get_report);

    let prices_route = warp::path!("api" / "v1" / "prices")
        .and(warp::get())
        .and(warp::query::<StockQuery>())
        .and(state_filter.clone())
        .and_then(get_prices);

    let prices_csv_route = warp::path!("api" / "v1" / "prices" / "csv")
        .and(warp::get())
        .and(warp::query::<StockQuery>())
        .and(state_filter.clone())
        .and_then(get_prices_csv);

    let chart_route = warp::path!("api" / "v1" / "chart")
        .and(warp::get())
        .and(warp::query::<StockQuery>())
        .and(state_filter.clone())
        .and_then(get_chart);

    info!("All routes configured successfully.");

    dashboard_route
        .or(report_route)
        .or(prices_route)
        .or(prices_csv_route)
        .or(chart_route)
        .recover(handle_rejection)
}
