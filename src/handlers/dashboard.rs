// src/handlers/dashboard.rs
use log::debug;
use warp::reply::Html;
use warp::Rejection;

const DASHBOARD_HTML: &str = include_str!("../../static/index.html");

pub async fn get_dashboard() -> Result<Html<&'static str>, Rejection> {
    debug!("Serving dashboard page");
    Ok(warp::reply::html(DASHBOARD_HTML))
}
