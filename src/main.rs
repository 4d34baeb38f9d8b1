//! Tradelens CLI - one-shot market analysis
//!
//! Reads a CSV export of candles (oldest first), computes the standard
//! indicator set, runs the analysis pipeline and prints the SCALP/SWING
//! recommendation pair as JSON to stdout.
//!
//! # Usage
//! ```sh
//! tradelens candles.csv --symbol BTCUSDT --pretty
//! ```
//!
//! # Environment Variables
//! - `RUST_LOG` - tracing filter (default: warn)
//! - `ZONE_MIN_CONFLUENCE`, `ZONE_MIN_STRENGTH`, `ZONE_MAX_DISTANCE_PCT`,
//!   `LIQUIDITY_LEVEL_PROXIMITY_USD`, `RSI_FORCE_LONG_BELOW`,
//!   `RSI_FORCE_SHORT_ABOVE` - threshold overrides

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::Deserialize;
use ta::{DataItem, Next};
use ta::indicators::{
    AverageTrueRange, MovingAverageConvergenceDivergence, RelativeStrengthIndex,
    SimpleMovingAverage,
};
use tracing::{Level, info, warn};
use tracing_subscriber::prelude::*;

use tradelens::application::analyzer::MarketAnalyzer;
use tradelens::application::context::AnalysisContext;
use tradelens::config::AnalysisConfig;
use tradelens::domain::types::Candle;

#[derive(Parser, Debug)]
#[command(name = "tradelens", version, about = "Deterministic SCALP/SWING trade analysis")]
struct Cli {
    /// CSV file of candles, oldest first: timestamp,open,high,low,close,volume
    csv: PathBuf,

    /// Symbol label used in logs and output
    #[arg(long, default_value = "UNKNOWN")]
    symbol: String,

    /// Current price override (defaults to the latest close)
    #[arg(long)]
    price: Option<f64>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(Debug, Deserialize)]
struct CandleRow {
    timestamp: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: f64,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false).pretty();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::WARN.into()))
        .with(stdout_layer)
        .init();

    let cli = Cli::parse();
    let config = AnalysisConfig::from_env()?;

    let rows = read_candles(&cli.csv)?;
    ensure!(!rows.is_empty(), "no candles in {}", cli.csv.display());

    let ctx = build_context(&cli, rows)?;
    let as_of = chrono::DateTime::from_timestamp(ctx.timestamp, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ctx.timestamp.to_string());
    info!(symbol = %ctx.symbol, candles = ctx.candles.len(), %as_of, "context built");

    let recommendations = MarketAnalyzer::analyze(&ctx, &config);
    let json = if cli.pretty {
        serde_json::to_string_pretty(&recommendations)?
    } else {
        serde_json::to_string(&recommendations)?
    };
    println!("{json}");
    Ok(())
}

fn read_candles(path: &PathBuf) -> Result<Vec<CandleRow>> {
    let file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut reader = csv::Reader::from_reader(file);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: CandleRow = record.context("malformed candle row")?;
        rows.push(row);
    }
    Ok(rows)
}

/// Converts the chronological CSV rows into the engine's newest-first
/// contract, computing the indicator set over the chronological pass.
fn build_context(cli: &Cli, rows: Vec<CandleRow>) -> Result<AnalysisContext> {
    let mut rsi = RelativeStrengthIndex::new(14).expect("RSI period must be > 0");
    let mut macd =
        MovingAverageConvergenceDivergence::new(12, 26, 9).expect("MACD periods must be valid");
    let mut sma20 = SimpleMovingAverage::new(20).expect("SMA period must be > 0");
    let mut sma50 = SimpleMovingAverage::new(50).expect("SMA period must be > 0");
    let mut sma100 = SimpleMovingAverage::new(100).expect("SMA period must be > 0");
    let mut sma200 = SimpleMovingAverage::new(200).expect("SMA period must be > 0");
    let mut atr = AverageTrueRange::new(14).expect("ATR period must be > 0");

    let mut last_rsi = 50.0;
    let mut last_macd = (0.0, 0.0);
    let mut last_ma = (0.0, 0.0, 0.0, 0.0);
    let mut last_atr = 0.0;
    for row in &rows {
        let close = row.close.to_f64().unwrap_or(0.0);
        last_rsi = rsi.next(close);
        let macd_out = macd.next(close);
        last_macd = (macd_out.macd, macd_out.signal);
        last_ma = (
            sma20.next(close),
            sma50.next(close),
            sma100.next(close),
            sma200.next(close),
        );
        // ATR needs the full bar: a close-only feed collapses true range
        // to close-to-close drift.
        let bar = DataItem::builder()
            .open(row.open.to_f64().unwrap_or(close))
            .high(row.high.to_f64().unwrap_or(close))
            .low(row.low.to_f64().unwrap_or(close))
            .close(close)
            .volume(row.volume)
            .build()
            .unwrap_or_else(|e| {
                warn!(
                    timestamp = row.timestamp,
                    error = ?e,
                    "bar failed validation, falling back to close-only bar"
                );
                DataItem::builder()
                    .open(close)
                    .high(close)
                    .low(close)
                    .close(close)
                    .volume(0.0)
                    .build()
                    .expect("close-only bar is always valid")
            });
        last_atr = atr.next(&bar);
    }

    let latest = rows.last().expect("rows checked non-empty");
    let current_price = match cli.price {
        Some(p) => Decimal::from_f64(p).context("invalid --price override")?,
        None => latest.close,
    };
    let timestamp = latest.timestamp;

    // Newest-first candle order from here on.
    let candles: Vec<Candle> = rows
        .into_iter()
        .rev()
        .map(|row| Candle {
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            timestamp: row.timestamp,
        })
        .collect();

    let mut ctx = AnalysisContext::new(cli.symbol.clone(), candles, current_price);
    ctx.rsi = last_rsi;
    ctx.macd_value = last_macd.0;
    ctx.macd_signal = last_macd.1;
    ctx.ma20 = last_ma.0;
    ctx.ma50 = last_ma.1;
    ctx.ma100 = last_ma.2;
    ctx.ma200 = last_ma.3;
    ctx.atr = last_atr;
    ctx.timestamp = timestamp;
    Ok(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(timestamp: i64, high: f64, low: f64, close: f64) -> CandleRow {
        CandleRow {
            timestamp,
            open: Decimal::from_f64(close).unwrap(),
            high: Decimal::from_f64(high).unwrap(),
            low: Decimal::from_f64(low).unwrap(),
            close: Decimal::from_f64(close).unwrap(),
            volume: 1000.0,
        }
    }

    #[test]
    fn test_atr_tracks_bar_range_not_close_drift() {
        let cli = Cli {
            csv: PathBuf::new(),
            symbol: "TEST".into(),
            price: None,
            pretty: false,
        };
        // Closes drift 0.1 per bar while every bar spans 2.0 high to low;
        // the ATR must follow the range, not the drift.
        let rows: Vec<CandleRow> = (0..40)
            .map(|i| {
                let p = 100.0 + i as f64 * 0.1;
                row(i, p + 1.0, p - 1.0, p)
            })
            .collect();

        let ctx = build_context(&cli, rows).unwrap();
        assert!(ctx.atr > 1.0, "atr {} should reflect the 2.0 bar range", ctx.atr);
    }

    #[test]
    fn test_build_context_reverses_to_newest_first() {
        let cli = Cli {
            csv: PathBuf::new(),
            symbol: "TEST".into(),
            price: None,
            pretty: false,
        };
        let rows = vec![row(1, 101.0, 99.0, 100.0), row(2, 102.0, 100.0, 101.0)];

        let ctx = build_context(&cli, rows).unwrap();
        assert_eq!(ctx.candles[0].timestamp, 2);
        assert_eq!(ctx.timestamp, 2);
    }
}
