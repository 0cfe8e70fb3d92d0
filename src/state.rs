// src/state.rs
use log::info;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::analysis::Analyst;
use crate::services::market_data::{FetchError, MarketDataFetcher, QuoteProvider, SeriesCache};
use crate::services::ollama::{ChatModel, OllamaClient};
use crate::services::yahoo::YahooClient;

/// Everything a request handler needs, shared across requests.
pub struct AppState {
    pub fetcher: MarketDataFetcher,
    pub analyst: Analyst,
}

impl AppState {
    pub fn new(provider: Arc<dyn QuoteProvider>, chat: Arc<dyn ChatModel>, cache: Arc<SeriesCache>, model: &str) -> Self {
        AppState {
            fetcher: MarketDataFetcher::new(provider, cache),
            analyst: Analyst::new(chat, model),
        }
    }

    /// Wires the Yahoo provider and the Ollama client from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, FetchError> {
        info!("Initializing application state...");

        let provider = YahooClient::new(config.yahoo_base_url.clone(), config.yahoo_auto_adjust)?;
        let chat = OllamaClient::new(config.ollama_host.clone());
        let cache = Arc::new(SeriesCache::new(config.cache_policy));

        info!("Market data from {}, cache policy {:?}", config.yahoo_base_url, cache.policy());
        info!("Analysis by {} at {}", config.ollama_model, chat.host());
        Ok(AppState::new(Arc::new(provider), Arc::new(chat), cache, &config.ollama_model))
    }
}
