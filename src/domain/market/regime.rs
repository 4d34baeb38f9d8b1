use serde::{Deserialize, Serialize};

pub use super::structure::TrendState;

/// Volatility flags derived from ATR ratios and wick/body ratios.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolatilityState {
    pub atr: f64,
    pub compression: bool,
    pub expansion: bool,
    pub wicky_market: bool,
    pub extreme_move: bool,
    pub fakeout_risk: bool,
    pub dangerous: bool,
    pub safe: bool,
}

/// Hard directional gate for the swing horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingBias {
    LongOnly,
    ShortOnly,
    NoTrade,
}

/// Soft directional preference for the scalp horizon. Never blocks a
/// zone-based trade, only shades its confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScalpBias {
    PreferLong,
    PreferShort,
    Both,
}

/// Per-horizon directional bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendBias {
    pub swing: SwingBias,
    pub scalp: ScalpBias,
}
