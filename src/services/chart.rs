// src/services/chart.rs
use chrono::NaiveDate;
use log::debug;
use std::fmt::Write;
use thiserror::Error;

use crate::models::PriceSeries;

pub const WIDTH: f64 = 1000.0;
pub const HEIGHT: f64 = 500.0;

const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 50.0;
const MARGIN_BOTTOM: f64 = 110.0;
const Y_TICKS: usize = 6;
const MAX_X_LABELS: usize = 10;
const LINE_COLOR: &str = "#1f77b4";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("cannot plot an empty series")]
    EmptySeries,
    #[error("failed to write chart: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Maps data coordinates onto the plot area.
struct Frame {
    first: NaiveDate,
    span_days: f64,
    y_min: f64,
    y_max: f64,
}

impl Frame {
    fn new(series: &PriceSeries) -> Option<Self> {
        let first = series.first_date()?;
        let last = series.last_date()?;
        let (lo, hi) = series
            .closes()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, c)| (lo.min(c), hi.max(c)));

        let pad = if hi > lo { (hi - lo) * 0.05 } else { lo.abs().max(1.0) * 0.05 };
        Some(Frame {
            first,
            span_days: (last - first).num_days() as f64,
            y_min: lo - pad,
            y_max: hi + pad,
        })
    }

    fn plot_width() -> f64 {
        WIDTH - MARGIN_LEFT - MARGIN_RIGHT
    }

    fn plot_height() -> f64 {
        HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
    }

    fn x(&self, date: NaiveDate) -> f64 {
        if self.span_days <= 0.0 {
            return MARGIN_LEFT + Self::plot_width() / 2.0;
        }
        let offset = (date - self.first).num_days() as f64;
        MARGIN_LEFT + offset / self.span_days * Self::plot_width()
    }

    fn y(&self, price: f64) -> f64 {
        let ratio = (price - self.y_min) / (self.y_max - self.y_min);
        MARGIN_TOP + (1.0 - ratio) * Self::plot_height()
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Draws closing price over time as an SVG document.
pub fn render_trend_chart(series: &PriceSeries, ticker: &str) -> Result<String, RenderError> {
    let frame = Frame::new(series).ok_or(RenderError::EmptySeries)?;
    debug!("Rendering {} points for {}", series.len(), ticker);

    let bottom = MARGIN_TOP + Frame::plot_height();
    let right = MARGIN_LEFT + Frame::plot_width();
    let mut svg = String::new();

    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}" font-family="sans-serif">"#,
        w = WIDTH,
        h = HEIGHT
    )?;
    writeln!(svg, r#"<rect width="100%" height="100%" fill="white"/>"#)?;
    writeln!(
        svg,
        r#"<text class="title" x="{}" y="30" text-anchor="middle" font-size="18">{} – Closing Price Trend</text>"#,
        WIDTH / 2.0,
        escape(ticker)
    )?;

    // Horizontal gridlines with price labels
    writeln!(svg, r##"<g class="grid" stroke="#dddddd" stroke-width="1">"##)?;
    let mut y_labels = String::new();
    for i in 0..Y_TICKS {
        let price = frame.y_min + (frame.y_max - frame.y_min) * i as f64 / (Y_TICKS - 1) as f64;
        let y = frame.y(price);
        writeln!(svg, r#"<line x1="{MARGIN_LEFT}" y1="{y:.1}" x2="{right}" y2="{y:.1}"/>"#)?;
        writeln!(
            y_labels,
            r#"<text x="{:.1}" y="{:.1}" text-anchor="end" font-size="11">{:.2}</text>"#,
            MARGIN_LEFT - 8.0,
            y + 4.0,
            price
        )?;
    }

    // Vertical gridlines at a thinned set of session dates
    let step = (series.len() + MAX_X_LABELS - 1) / MAX_X_LABELS;
    let mut x_labels = String::new();
    for bar in series.bars().iter().step_by(step.max(1)) {
        let x = frame.x(bar.date);
        writeln!(svg, r#"<line x1="{x:.1}" y1="{MARGIN_TOP}" x2="{x:.1}" y2="{bottom}"/>"#)?;
        let label_y = bottom + 16.0;
        writeln!(
            x_labels,
            r#"<text class="x-label" x="{x:.1}" y="{label_y:.1}" text-anchor="end" font-size="11" transform="rotate(-45 {x:.1} {label_y:.1})">{}</text>"#,
            bar.date.format("%Y-%m-%d")
        )?;
    }
    writeln!(svg, "</g>")?;
    svg.push_str(&y_labels);
    svg.push_str(&x_labels);

    // Axes and their titles
    writeln!(
        svg,
        r#"<path d="M{MARGIN_LEFT} {MARGIN_TOP} V{bottom} H{right}" fill="none" stroke="black"/>"#
    )?;
    writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="middle" font-size="13">Date</text>"#,
        MARGIN_LEFT + Frame::plot_width() / 2.0,
        HEIGHT - 12.0
    )?;
    let y_title = MARGIN_TOP + Frame::plot_height() / 2.0;
    writeln!(
        svg,
        r#"<text x="20" y="{y_title:.1}" text-anchor="middle" font-size="13" transform="rotate(-90 20 {y_title:.1})">Price (USD)</text>"#
    )?;

    // Close line with point markers
    let points: Vec<(f64, f64)> = series
        .closes()
        .map(|(date, close)| (frame.x(date), frame.y(close)))
        .collect();
    let path = points
        .iter()
        .map(|(x, y)| format!("{x:.1},{y:.1}"))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(
        svg,
        r#"<polyline class="close-line" points="{path}" fill="none" stroke="{LINE_COLOR}" stroke-width="2"/>"#
    )?;
    for (x, y) in &points {
        writeln!(svg, r#"<circle class="point" cx="{x:.1}" cy="{y:.1}" r="3.5" fill="{LINE_COLOR}"/>"#)?;
    }

    // Legend
    let lx = MARGIN_LEFT + 12.0;
    let ly = MARGIN_TOP + 12.0;
    writeln!(
        svg,
        r##"<g class="legend"><rect x="{lx}" y="{ly}" width="118" height="26" fill="white" fill-opacity="0.8" stroke="#999999"/><line x1="{:.1}" y1="{:.1}" x2="{:.1}" y2="{:.1}" stroke="{LINE_COLOR}" stroke-width="2"/><circle cx="{:.1}" cy="{:.1}" r="3.5" fill="{LINE_COLOR}"/><text x="{:.1}" y="{:.1}" font-size="12">Close Price</text></g>"##,
        lx + 8.0,
        ly + 13.0,
        lx + 32.0,
        ly + 13.0,
        lx + 20.0,
        ly + 13.0,
        lx + 40.0,
        ly + 17.0
    )?;

    svg.push_str("</svg>\n");
    Ok(svg)
}
