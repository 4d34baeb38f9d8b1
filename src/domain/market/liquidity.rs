use serde::{Deserialize, Serialize};

/// Which side of price a liquidity feature sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquiditySide {
    High,
    Low,
}

/// A fractal swing level scored by how often price revisited it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquidityLevel {
    pub price: f64,
    pub side: LiquiditySide,
    pub touches: u32,
    pub strength: f64,
    /// Candle index of the forming pivot (newest-first), so later scans
    /// can tell candles newer than the level from older ones.
    pub index: usize,
}

/// A price where several candle extremes line up within the proximity
/// band, implying resting stop orders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopCluster {
    pub price: f64,
    pub side: LiquiditySide,
    /// Equal-price extremes found near this level.
    pub count: u32,
    pub strength: f64,
}

/// A rejected wick extreme whose level held afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepZone {
    pub level: f64,
    pub side: LiquiditySide,
    pub strength: f64,
}

/// A former support/resistance level that was closed through and now
/// plays the opposite role.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreakerBlock {
    pub price: f64,
    pub side: LiquiditySide,
    pub touches: u32,
    pub strength: f64,
}

/// The last opposite-colored candle before a strong directional move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub high: f64,
    pub low: f64,
    pub bullish: bool,
    /// Size of the move that followed, in percent.
    pub move_pct: f64,
    pub strength: f64,
}

impl OrderBlock {
    pub fn midpoint(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn overlaps(&self, low: f64, high: f64) -> bool {
        self.low <= high && self.high >= low
    }
}

/// A run of thin-volume candles; price tends to traverse these quickly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumePocket {
    pub high: f64,
    pub low: f64,
    /// Number of candles in the run.
    pub span: usize,
    pub strength: f64,
}

/// Nearest liquidity-based price magnet above and below current price.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LiquidityTarget {
    pub above: Option<f64>,
    pub below: Option<f64>,
}

/// Aggregate output of the liquidity stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityMap {
    pub levels: Vec<LiquidityLevel>,
    pub stop_clusters: Vec<StopCluster>,
    pub sweep_zones: Vec<SweepZone>,
    pub breaker_blocks: Vec<BreakerBlock>,
    pub order_blocks: Vec<OrderBlock>,
    pub volume_pockets: Vec<VolumePocket>,
    pub target: LiquidityTarget,
}
