use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::domain::types::Candle;

/// Everything one analysis call consumes.
///
/// Candles are ordered newest-first (`candles[0]` is the latest bar).
/// Indicator values are supplied by the caller; the engine never derives
/// them internally so that identical inputs always reproduce identical
/// outputs.
#[derive(Debug, Clone)]
pub struct AnalysisContext {
    pub symbol: String,
    pub candles: Vec<Candle>,
    pub current_price: Decimal,
    pub price_f64: f64,
    pub rsi: f64,
    pub macd_value: f64,
    pub macd_signal: f64,
    pub ma20: f64,
    pub ma50: f64,
    pub ma100: f64,
    pub ma200: f64,
    pub atr: f64,
    pub support_levels: Vec<f64>,
    pub resistance_levels: Vec<f64>,
    pub timestamp: i64,
}

impl AnalysisContext {
    pub fn new(symbol: impl Into<String>, candles: Vec<Candle>, current_price: Decimal) -> Self {
        let price_f64 = current_price.to_f64().unwrap_or(0.0);
        Self {
            symbol: symbol.into(),
            candles,
            current_price,
            price_f64,
            rsi: 50.0,
            macd_value: 0.0,
            macd_signal: 0.0,
            ma20: 0.0,
            ma50: 0.0,
            ma100: 0.0,
            ma200: 0.0,
            atr: 0.0,
            support_levels: Vec::new(),
            resistance_levels: Vec::new(),
            timestamp: 0,
        }
    }

    /// ATR with a floor so downstream multiples never degenerate to zero.
    pub fn atr_effective(&self) -> f64 {
        self.atr.max(self.price_f64 * 0.0005)
    }

    pub fn scale(&self) -> PriceScale {
        PriceScale::new(self.price_f64)
    }
}

/// Conversion boundary between quote-currency configuration defaults and
/// the percentage-of-price arithmetic used everywhere inside the engine.
#[derive(Debug, Clone, Copy)]
pub struct PriceScale {
    price: f64,
}

impl PriceScale {
    pub fn new(price: f64) -> Self {
        Self { price }
    }

    /// Express an absolute quote-currency offset as a percent of price.
    /// Degenerate price returns 0, never faults.
    pub fn usd_as_pct(&self, usd: f64) -> f64 {
        if self.price <= 0.0 {
            return 0.0;
        }
        usd / self.price * 100.0
    }

    /// Absolute distance corresponding to a percent of current price.
    pub fn pct_as_abs(&self, pct: f64) -> f64 {
        self.price * pct / 100.0
    }

    /// Percent-of-price distance between two levels.
    pub fn distance_pct(&self, a: f64, b: f64) -> f64 {
        if self.price <= 0.0 {
            return 0.0;
        }
        (a - b).abs() / self.price * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_round_trip() {
        let scale = PriceScale::new(50_000.0);
        let pct = scale.usd_as_pct(500.0);
        assert!((pct - 1.0).abs() < 1e-9);
        assert!((scale.pct_as_abs(pct) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_scale_degenerate_price() {
        let scale = PriceScale::new(0.0);
        assert_eq!(scale.usd_as_pct(3.0), 0.0);
        assert_eq!(scale.distance_pct(10.0, 5.0), 0.0);
    }
}
