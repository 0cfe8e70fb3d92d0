// src/lib.rs
pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use config::AppConfig;
pub use models::{AnalysisOutcome, PriceBar, PriceSeries, Window};
pub use state::AppState;
