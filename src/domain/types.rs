use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single OHLCV bar.
///
/// Candle sequences are ordered **newest-first** throughout the engine:
/// `candles[0]` is the latest bar. Prices are carried as `Decimal` at the
/// boundary and converted to `f64` inside the detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: f64,
    pub timestamp: i64,
}

impl Candle {
    pub fn open_f64(&self) -> f64 {
        self.open.to_f64().unwrap_or(0.0)
    }

    pub fn high_f64(&self) -> f64 {
        self.high.to_f64().unwrap_or(0.0)
    }

    pub fn low_f64(&self) -> f64 {
        self.low.to_f64().unwrap_or(0.0)
    }

    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }

    /// Absolute body size.
    pub fn body(&self) -> f64 {
        (self.close_f64() - self.open_f64()).abs()
    }

    /// Full high-low range.
    pub fn range(&self) -> f64 {
        self.high_f64() - self.low_f64()
    }

    /// Wick above the body.
    pub fn upper_wick(&self) -> f64 {
        self.high_f64() - self.open_f64().max(self.close_f64())
    }

    /// Wick below the body.
    pub fn lower_wick(&self) -> f64 {
        self.open_f64().min(self.close_f64()) - self.low_f64()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Direction of a trade recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
    NoTrade,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
            Direction::NoTrade => write!(f, "NO-TRADE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_wick_geometry() {
        let c = Candle {
            open: dec!(100.0),
            high: dec!(110.0),
            low: dec!(95.0),
            close: dec!(105.0),
            volume: 1000.0,
            timestamp: 0,
        };
        assert_eq!(c.body(), 5.0);
        assert_eq!(c.range(), 15.0);
        assert_eq!(c.upper_wick(), 5.0);
        assert_eq!(c.lower_wick(), 5.0);
        assert!(c.is_bullish());
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Buy.to_string(), "BUY");
        assert_eq!(Direction::NoTrade.to_string(), "NO-TRADE");
    }
}
