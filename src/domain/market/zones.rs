use serde::{Deserialize, Serialize};

/// A demand or supply zone anchored on a base candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub kind: ZoneKind,
    pub high: f64,
    pub low: f64,
    /// 0..=100 composite score.
    pub strength: f64,
    /// Midpoint distance from current price, as a percentage of price.
    pub distance_pct: f64,
    pub untested: bool,
    pub test_count: u32,
    /// Candles between the base and the qualifying move.
    pub reaction_speed: usize,
    /// Size of the qualifying move, in percent.
    pub move_pct: f64,
}

impl Zone {
    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ZoneKind {
    Demand,
    Supply,
}

/// Fair Value Gap: a 3-bar gap the middle candle left unfilled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FvgSignal {
    pub kind: FvgKind,
    pub high: f64,
    pub low: f64,
}

impl FvgSignal {
    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FvgKind {
    Bullish,
    Bearish,
}

/// A candle whose body dominates its range (one-sided auction).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Imbalance {
    pub high: f64,
    pub low: f64,
    pub bullish: bool,
}

/// A wick rejection: the opposite wick dwarfs the body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RejectionWick {
    pub level: f64,
    pub bullish: bool,
}

/// A zone validated against current price with a confluence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionZone {
    pub zone: Zone,
    /// 0..=100 aggregate of zone strength and indicator alignment.
    pub confluence: f64,
    pub valid: bool,
}

/// Aggregate output of the zone detection stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneAnalysis {
    pub demand_zones: Vec<Zone>,
    pub supply_zones: Vec<Zone>,
    pub fvg: Option<FvgSignal>,
    pub imbalances: Vec<Imbalance>,
    pub rejection_wicks: Vec<RejectionWick>,
    pub nearest_zone: Option<Zone>,
    pub reaction_zone: Option<ReactionZone>,
}
