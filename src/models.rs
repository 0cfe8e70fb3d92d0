// src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Relative span of history requested from the market data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Window {
    #[serde(rename = "5d")]
    FiveDays,
    #[default]
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "1y")]
    OneYear,
}

impl Window {
    pub const ALL: [Window; 5] = [
        Window::FiveDays,
        Window::OneMonth,
        Window::ThreeMonths,
        Window::SixMonths,
        Window::OneYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Window::FiveDays => "5d",
            Window::OneMonth => "1mo",
            Window::ThreeMonths => "3mo",
            Window::SixMonths => "6mo",
            Window::OneYear => "1y",
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported window '{0}', expected one of 5d, 1mo, 3mo, 6mo, 1y")]
pub struct ParseWindowError(pub String);

impl FromStr for Window {
    type Err = ParseWindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Window::ALL
            .iter()
            .copied()
            .find(|w| w.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseWindowError(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickerError {
    #[error("Please enter a valid stock ticker.")]
    Empty,
}

/// Trim and uppercase a user-entered ticker.
///
/// Anything non-blank is accepted; a symbol the provider does not know
/// simply yields an empty series.
pub fn normalize_ticker(raw: &str) -> Result<String, TickerError> {
    let ticker = raw.trim().to_uppercase();
    if ticker.is_empty() {
        return Err(TickerError::Empty);
    }
    Ok(ticker)
}

/// One daily observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Daily observations in ascending date order, one per date.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSeries {
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Sorts by date; a repeated date keeps the observation that came last.
    pub fn from_bars(mut bars: Vec<PriceBar>) -> Self {
        // Stable sort keeps arrival order among equal dates
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self { bars: deduped }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// The most recent `n` observations, or all of them when there are fewer.
    pub fn tail(&self, n: usize) -> &[PriceBar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn closes(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.bars.iter().map(|b| (b.date, b.close))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisErrorKind {
    /// The model service could not be reached or the connection dropped.
    Transport,
    /// The model service reported a failure, by HTTP status or in the reply body.
    Status,
    /// The reply body could not be decoded.
    Decode,
}

/// Outcome of one analysis request.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Reply(String),
    NoData,
    Failed {
        kind: AnalysisErrorKind,
        message: String,
    },
}

impl AnalysisOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            AnalysisOutcome::Reply(_) => "ok",
            AnalysisOutcome::NoData => "no_data",
            AnalysisOutcome::Failed { .. } => "error",
        }
    }
}

impl fmt::Display for AnalysisOutcome {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AnalysisOutcome::Reply(text) => f.write_str(text),
            AnalysisOutcome::NoData => f.write_str("No data available for analysis."),
            AnalysisOutcome::Failed { message, .. } => write!(f, "LLM Error: {}", message),
        }
    }
}
