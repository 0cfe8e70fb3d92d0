// src/services/analysis.rs
use log::{error, info, warn};
use std::fmt::Write;
use std::sync::Arc;

use crate::models::{AnalysisOutcome, ChatMessage, PriceBar, PriceSeries};
use super::ollama::ChatModel;

/// Number of most recent sessions embedded in the prompt.
pub const PROMPT_ROWS: usize = 10;

/// Renders bars as a fixed-width text table, one line per session.
///
/// Prices use the shortest exact decimal form, so sub-cent quotes survive.
pub fn format_table(bars: &[PriceBar]) -> String {
    let mut table = format!(
        "{:<10} {:>20} {:>20} {:>20} {:>20} {:>12}\n",
        "Date", "Open", "High", "Low", "Close", "Volume"
    );
    for bar in bars {
        // Writing into a String cannot fail
        let _ = writeln!(
            table,
            "{:<10} {:>20} {:>20} {:>20} {:>20} {:>12}",
            bar.date.format("%Y-%m-%d"),
            bar.open,
            bar.high,
            bar.low,
            bar.close,
            bar.volume
        );
    }
    table
}

pub fn build_prompt(series: &PriceSeries, ticker: &str) -> String {
    let recent = format_table(series.tail(PROMPT_ROWS));
    format!(
        "You are a financial analyst.

Stock ticker: {ticker}

Recent market data:
{recent}
Tasks:
1. Identify short-term trend
2. Comment on volatility
3. Provide a Buy / Sell / Hold recommendation
4. Brief reasoning

Limit response to 200 words.
"
    )
}

/// Sends recent price history to a chat model and reports what it said.
pub struct Analyst {
    chat: Arc<dyn ChatModel>,
    model: String,
}

impl Analyst {
    pub fn new(chat: Arc<dyn ChatModel>, model: impl Into<String>) -> Self {
        Analyst {
            chat,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Never fails: model errors come back as [`AnalysisOutcome::Failed`].
    pub async fn analyze(&self, series: &PriceSeries, ticker: &str) -> AnalysisOutcome {
        if series.is_empty() {
            warn!("No rows for {}, skipping analysis", ticker);
            return AnalysisOutcome::NoData;
        }

        let prompt = build_prompt(series, ticker);
        info!(
            "Requesting analysis of {} with {} rows from model {}",
            ticker,
            series.tail(PROMPT_ROWS).len(),
            self.model
        );

        let messages = [ChatMessage::user(prompt)];
        match self.chat.chat(&self.model, &messages).await {
            Ok(reply) => {
                info!("Received {} chars of analysis for {}", reply.len(), ticker);
                AnalysisOutcome::Reply(reply)
            }
            Err(e) => {
                error!("LLM call for {} failed: {}", ticker, e);
                AnalysisOutcome::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnalysisErrorKind, Role};
    use crate::services::ollama::ChatError;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingModel {
        requests: Mutex<Vec<(String, Vec<ChatMessage>)>>,
        fail: bool,
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, ChatError> {
            self.requests
                .lock()
                .unwrap()
                .push((model.to_string(), messages.to_vec()));
            if self.fail {
                Err(ChatError::Status {
                    status: 500,
                    message: "model runner crashed".to_string(),
                })
            } else {
                Ok("Trend: sideways. Recommendation: Hold.".to_string())
            }
        }
    }

    fn series(rows: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        PriceSeries::from_bars(
            (1..=rows)
                .map(|n| PriceBar {
                    date: start + chrono::Duration::days(n as i64),
                    open: 100.0 + n as f64,
                    high: 200.0 + n as f64,
                    low: 50.0 + n as f64,
                    close: 150.0 + n as f64,
                    volume: 1_000 + n as u64,
                })
                .collect(),
        )
    }

    fn analyst(fail: bool) -> (Arc<RecordingModel>, Analyst) {
        let model = Arc::new(RecordingModel {
            fail,
            ..Default::default()
        });
        (model.clone(), Analyst::new(model, "NeuralTicker"))
    }

    #[tokio::test]
    async fn empty_series_skips_the_model() {
        let (model, analyst) = analyst(false);
        let outcome = analyst.analyze(&PriceSeries::empty(), "ZZZZINVALID").await;
        assert_eq!(outcome, AnalysisOutcome::NoData);
        assert_eq!(outcome.to_string(), "No data available for analysis.");
        assert!(model.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn prompt_holds_only_the_last_ten_rows() {
        let (model, analyst) = analyst(false);
        let outcome = analyst.analyze(&series(22), "AAPL").await;
        assert!(matches!(outcome, AnalysisOutcome::Reply(_)));

        let requests = model.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (name, messages) = &requests[0];
        assert_eq!(name, "NeuralTicker");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);

        let prompt = &messages[0].content;
        assert!(prompt.contains("Stock ticker: AAPL"));
        for n in 13..=22u64 {
            assert!(prompt.contains(&format!("{}", 1_000 + n)), "row {} missing", n);
            assert!(prompt.contains(&format!(" {}", 150.0 + n as f64)));
        }
        for n in 1..=12u64 {
            assert!(!prompt.contains(&format!(" {}\n", 1_000 + n)), "row {} leaked", n);
        }
        assert_eq!(prompt.matches("2024-05-").count(), 10);
    }

    #[tokio::test]
    async fn short_series_is_sent_whole() {
        let (model, analyst) = analyst(false);
        analyst.analyze(&series(3), "MSFT").await;
        let requests = model.requests.lock().unwrap();
        let prompt = &requests[0].1[0].content;
        assert_eq!(prompt.matches("2024-05-").count(), 3);
    }

    #[tokio::test]
    async fn exactly_ten_rows_are_sent_whole() {
        let (model, analyst) = analyst(false);
        analyst.analyze(&series(10), "AAPL").await;
        let requests = model.requests.lock().unwrap();
        let prompt = &requests[0].1[0].content;
        assert_eq!(prompt.matches("2024-05-").count(), 10);
        assert!(prompt.contains("2024-05-02"));
        assert!(prompt.contains("2024-05-11"));
    }

    #[tokio::test]
    async fn eleven_rows_drop_the_oldest() {
        let (model, analyst) = analyst(false);
        analyst.analyze(&series(11), "AAPL").await;
        let requests = model.requests.lock().unwrap();
        let prompt = &requests[0].1[0].content;
        assert_eq!(prompt.matches("2024-05-").count(), 10);
        assert!(!prompt.contains("2024-05-02"));
        assert!(prompt.contains("2024-05-12"));
    }

    #[test]
    fn sub_dollar_prices_keep_their_digits() {
        let start = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let fx = PriceSeries::from_bars(
            (0..3)
                .map(|i| PriceBar {
                    date: start + chrono::Duration::days(i),
                    open: 0.004512,
                    high: 1.0912,
                    low: 0.000031,
                    close: 1.08345,
                    volume: 10,
                })
                .collect(),
        );
        let prompt = build_prompt(&fx, "EURUSD=X");
        assert!(prompt.contains("0.004512"));
        assert!(prompt.contains("1.0912"));
        assert!(prompt.contains("0.000031"));
        assert!(prompt.contains("1.08345"));
        assert!(!prompt.contains(" 0.00 "));
    }

    #[tokio::test]
    async fn model_failure_becomes_an_outcome() {
        let (_, analyst) = analyst(true);
        let outcome = analyst.analyze(&series(5), "AAPL").await;
        assert!(matches!(
            outcome,
            AnalysisOutcome::Failed {
                kind: AnalysisErrorKind::Status,
                ..
            }
        ));
        let text = outcome.to_string();
        assert!(text.starts_with("LLM Error: "));
        assert!(text.contains("model runner crashed"));
    }

    #[test]
    fn prompt_lists_the_four_tasks_and_word_limit() {
        let prompt = build_prompt(&series(1), "GOOG");
        assert!(prompt.starts_with("You are a financial analyst."));
        assert!(prompt.contains("1. Identify short-term trend"));
        assert!(prompt.contains("2. Comment on volatility"));
        assert!(prompt.contains("3. Provide a Buy / Sell / Hold recommendation"));
        assert!(prompt.contains("4. Brief reasoning"));
        assert!(prompt.contains("Limit response to 200 words."));
    }

    #[test]
    fn table_has_header_and_one_line_per_bar() {
        let table = format_table(series(2).bars());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Date"));
        assert!(lines[1].starts_with("2024-05-02"));
        assert!(lines[1].ends_with("1001"));
    }
}
