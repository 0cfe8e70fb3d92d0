// src/services/yahoo.rs
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::models::{PriceBar, PriceSeries, Window};
use super::market_data::{FetchError, QuoteProvider};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    exchange_timezone_name: Option<String>,
    #[serde(default)]
    gmtoffset: i32,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
    #[serde(default)]
    adjclose: Vec<AdjCloseBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
struct AdjCloseBlock {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

/// Daily history from the Yahoo Finance chart endpoint.
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
    auto_adjust: bool,
}

impl YahooClient {
    pub fn new(base_url: impl Into<String>, auto_adjust: bool) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()?;

        Ok(YahooClient {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auto_adjust,
        })
    }

    fn chart_url(&self, ticker: &str) -> String {
        format!("{}/v8/finance/chart/{}", self.base_url, encode_segment(ticker))
    }
}

#[async_trait]
impl QuoteProvider for YahooClient {
    async fn history(&self, ticker: &str, window: Window) -> Result<PriceSeries, FetchError> {
        let url = self.chart_url(ticker);
        info!("Fetching {} history from URL: {}", window, url);

        let resp = self
            .client
            .get(&url)
            .query(&[
                ("range", window.as_str()),
                ("interval", "1d"),
                ("includeAdjustedClose", "true"),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        // Unknown symbols come back as 404 with a regular chart error body
        if !status.is_success() && status != StatusCode::NOT_FOUND {
            warn!("Yahoo returned HTTP {} for {}", status, ticker);
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        match parse_chart(&body, self.auto_adjust) {
            // A 404 without a chart body still means the symbol is unknown
            Err(FetchError::Decode(e)) if status == StatusCode::NOT_FOUND => {
                info!("No chart body for {} ({}), treating as no data", ticker, e);
                Ok(PriceSeries::empty())
            }
            other => other,
        }
    }
}

/// Percent-encodes everything outside the unreserved set, so index (`^GSPC`),
/// FX (`EURUSD=X`) and slash-separated symbols stay one path segment.
fn encode_segment(symbol: &str) -> String {
    let mut out = String::with_capacity(symbol.len());
    for byte in symbol.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

/// Decodes a chart response body into a series.
pub fn parse_chart(body: &str, auto_adjust: bool) -> Result<PriceSeries, FetchError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;

    if let Some(err) = envelope.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            info!("No data found: {}", err.description);
            return Ok(PriceSeries::empty());
        }
        return Err(FetchError::Provider(format!("{}: {}", err.code, err.description)));
    }

    let result = match envelope.chart.result.and_then(|r| r.into_iter().next()) {
        Some(result) => result,
        None => return Ok(PriceSeries::empty()),
    };

    let tz: Option<Tz> = result
        .meta
        .exchange_timezone_name
        .as_deref()
        .and_then(|name| name.parse().ok());
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .unwrap_or_default()
        .adjclose;

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, &ts) in result.timestamp.iter().enumerate() {
        let (open, high, low, close) = match (
            at(&quote.open, i),
            at(&quote.high, i),
            at(&quote.low, i),
            at(&quote.close, i),
        ) {
            (Some(o), Some(h), Some(l), Some(c)) => (o, h, l, c),
            _ => {
                debug!("Skipping incomplete row at timestamp {}", ts);
                continue;
            }
        };
        let date = match local_date(ts, tz, result.meta.gmtoffset) {
            Some(date) => date,
            None => continue,
        };

        let ratio = match at(&adjclose, i) {
            Some(adj) if auto_adjust && close > 0.0 => adj / close,
            _ => 1.0,
        };

        bars.push(PriceBar {
            date,
            open: open * ratio,
            high: high * ratio,
            low: low * ratio,
            close: close * ratio,
            volume: at(&quote.volume, i).map(|v| v.max(0.0).round() as u64).unwrap_or(0),
        });
    }

    Ok(PriceSeries::from_bars(bars))
}

fn at(col: &[Option<f64>], i: usize) -> Option<f64> {
    col.get(i).copied().flatten()
}

fn local_date(ts: i64, tz: Option<Tz>, gmtoffset: i32) -> Option<NaiveDate> {
    let utc = DateTime::<Utc>::from_timestamp(ts, 0)?;
    match tz {
        Some(tz) => Some(utc.with_timezone(&tz).date_naive()),
        None => FixedOffset::east_opt(gmtoffset).map(|offset| utc.with_timezone(&offset).date_naive()),
    }
}
