// src/services/mod.rs
pub mod analysis;
pub mod chart;
pub mod export;
pub mod market_data;
pub mod ollama;
pub mod yahoo;
