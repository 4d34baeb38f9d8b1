use serde::{Deserialize, Serialize};
use std::fmt;

/// A confirmed fractal swing point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub kind: PivotKind,
    pub price: f64,
    /// Index into the newest-first candle slice (0 = latest bar).
    pub index: usize,
    pub time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PivotKind {
    High,
    Low,
}

/// Break of Structure: a close beyond the most recent swing point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BosSignal {
    pub kind: BosKind,
    pub price: f64,
    /// 50..=100, scaled from the break distance.
    pub strength: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BosKind {
    Bullish,
    Bearish,
}

/// Change of Character: a pivot pattern reversal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChochSignal {
    pub kind: ChochKind,
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChochKind {
    Bullish,
    Bearish,
}

/// A wick through a known swing level that closed back inside.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySweep {
    pub kind: SweepKind,
    pub level: f64,
    pub rejected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SweepKind {
    High,
    Low,
}

/// Five-state trend classification shared by the structure analyzer and
/// the regime classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendState {
    StrongUptrend,
    WeakUptrend,
    Range,
    WeakDowntrend,
    StrongDowntrend,
}

impl TrendState {
    pub fn is_bullish(&self) -> bool {
        matches!(self, TrendState::StrongUptrend | TrendState::WeakUptrend)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(
            self,
            TrendState::StrongDowntrend | TrendState::WeakDowntrend
        )
    }

    pub fn is_strong(&self) -> bool {
        matches!(
            self,
            TrendState::StrongUptrend | TrendState::StrongDowntrend
        )
    }
}

impl fmt::Display for TrendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendState::StrongUptrend => write!(f, "Strong Uptrend"),
            TrendState::WeakUptrend => write!(f, "Weak Uptrend"),
            TrendState::Range => write!(f, "Range"),
            TrendState::WeakDowntrend => write!(f, "Weak Downtrend"),
            TrendState::StrongDowntrend => write!(f, "Strong Downtrend"),
        }
    }
}

/// Short-horizon drift over the most recent 20 candles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MicroTrend {
    Bullish,
    Bearish,
    Neutral,
}

/// Aggregate output of the market structure stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketStructure {
    pub trend: TrendState,
    pub bos: Option<BosSignal>,
    pub choch: Option<ChochSignal>,
    pub sweep: Option<LiquiditySweep>,
    pub stop_hunt: bool,
    pub pivots: Vec<Pivot>,
    pub micro_trend: MicroTrend,
}
