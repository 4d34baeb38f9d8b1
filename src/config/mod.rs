//! Analysis configuration.
//!
//! Every tunable threshold of the pipeline lives here as an immutable
//! value passed into each analysis call. Defaults carry the heuristic
//! constants the engine was tuned with; `from_env` lets deployments
//! override the zone/liquidity/RSI cutoffs without a rebuild.
//!
//! Absolute-dollar fields (`*_usd`) are converted to fractions of the
//! current price once per call, at the `PriceScale` boundary.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

/// Market structure thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureConfig {
    /// Candles required on each side of a swing pivot.
    pub pivot_lookaround: usize,
    pub min_candles: usize,
    /// Recent pivots examined for a break of structure.
    pub bos_pivot_window: usize,
    /// Recent pivots examined for a change of character.
    pub choch_pivot_window: usize,
    pub choch_confidence: u8,
    /// Candles scanned for a liquidity sweep.
    pub sweep_lookback: usize,
    pub stop_hunt_wick_ratio: f64,
    pub stop_hunt_lookback: usize,
    pub micro_trend_window: usize,
    pub micro_trend_threshold_pct: f64,
    pub strong_trend_score: f64,
    pub weak_trend_score: f64,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            pivot_lookaround: 5,
            min_candles: 50,
            bos_pivot_window: 10,
            choch_pivot_window: 6,
            choch_confidence: 75,
            sweep_lookback: 5,
            stop_hunt_wick_ratio: 3.0,
            stop_hunt_lookback: 3,
            micro_trend_window: 20,
            micro_trend_threshold_pct: 0.3,
            strong_trend_score: 50.0,
            weak_trend_score: 15.0,
        }
    }
}

/// Demand/supply zone thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    pub min_candles: usize,
    /// Base candles are scanned at indices `scan_start..scan_limit`.
    pub scan_start: usize,
    pub scan_limit: usize,
    /// The qualifying move must come within this many candles of the base.
    pub reaction_min_candles: usize,
    pub reaction_max_candles: usize,
    /// Minimum move away from the base, in percent.
    pub min_move_pct: f64,
    /// Zones further than this from price are discarded, in percent.
    pub max_distance_pct: f64,
    pub max_zones: usize,
    pub base_strength: f64,
    /// Configured confluence minimum for reaction-zone validation.
    pub min_confluence: f64,
    /// Configured strength minimum for reaction-zone validation.
    pub min_strength: f64,
    /// FVG gaps smaller than this (quote currency) are ignored.
    pub fvg_min_gap_usd: f64,
    pub imbalance_body_ratio: f64,
    pub rejection_wick_ratio: f64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            min_candles: 50,
            scan_start: 10,
            scan_limit: 100,
            reaction_min_candles: 3,
            reaction_max_candles: 10,
            min_move_pct: 0.3,
            max_distance_pct: 2.0,
            max_zones: 10,
            base_strength: 40.0,
            min_confluence: 65.0,
            min_strength: 55.0,
            fvg_min_gap_usd: 0.01,
            imbalance_body_ratio: 0.8,
            rejection_wick_ratio: 2.0,
        }
    }
}

/// Liquidity map thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidityConfig {
    pub min_candles: usize,
    /// Candles on each side of a 5-candle fractal point.
    pub fractal_lookaround: usize,
    /// Band (quote currency) within which extremes count as equal.
    pub level_proximity_usd: f64,
    pub touch_strength: f64,
    pub max_levels: usize,
    pub cluster_window: usize,
    pub cluster_min_matches: u32,
    pub cluster_strength_step: f64,
    pub max_clusters: usize,
    pub sweep_wick_ratio: f64,
    pub sweep_respect_window: usize,
    pub sweep_strength: f64,
    pub max_sweeps: usize,
    pub breaker_min_touches: u32,
    pub breaker_strength: f64,
    pub max_breakers: usize,
    /// Minimum follow-through move for an order block, in percent.
    pub order_block_move_pct: f64,
    pub order_block_window: usize,
    pub max_order_blocks: usize,
    pub pocket_volume_ratio: f64,
    pub pocket_min_span: usize,
    pub max_pockets: usize,
}

impl Default for LiquidityConfig {
    fn default() -> Self {
        Self {
            min_candles: 100,
            fractal_lookaround: 2,
            level_proximity_usd: 1.0,
            touch_strength: 20.0,
            max_levels: 10,
            cluster_window: 50,
            cluster_min_matches: 2,
            cluster_strength_step: 25.0,
            max_clusters: 5,
            sweep_wick_ratio: 2.0,
            sweep_respect_window: 20,
            sweep_strength: 75.0,
            max_sweeps: 3,
            breaker_min_touches: 2,
            breaker_strength: 70.0,
            max_breakers: 3,
            order_block_move_pct: 0.5,
            order_block_window: 10,
            max_order_blocks: 5,
            pocket_volume_ratio: 0.5,
            pocket_min_span: 3,
            max_pockets: 3,
        }
    }
}

/// Volatility classification thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatilityConfig {
    pub compression_ratio: f64,
    pub expansion_ratio: f64,
    pub wicky_ratio: f64,
    pub extreme_ratio: f64,
    pub short_window: usize,
    pub long_window: usize,
    pub wick_window: usize,
}

impl Default for VolatilityConfig {
    fn default() -> Self {
        Self {
            compression_ratio: 0.8,
            expansion_ratio: 1.3,
            wicky_ratio: 1.5,
            extreme_ratio: 2.0,
            short_window: 5,
            long_window: 20,
            wick_window: 10,
        }
    }
}

/// Regime classifier thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    pub rsi_upper: f64,
    pub rsi_lower: f64,
    pub strong_score: i32,
    pub weak_score: i32,
    pub dominance_window: usize,
    pub dominance_margin: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            rsi_upper: 60.0,
            rsi_lower: 40.0,
            strong_score: 6,
            weak_score: 2,
            dominance_window: 20,
            dominance_margin: 5,
        }
    }
}

/// Scalp trade construction thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalpConfig {
    /// When no reaction zone validated, search raw zones within this
    /// many ATRs of price.
    pub zone_search_atr_mult: f64,
    pub momentum_penalty: i32,
    /// RSI below this forces a long at a demand zone.
    pub rsi_force_long_below: f64,
    /// RSI above this forces a short at a supply zone.
    pub rsi_force_short_above: f64,
    /// Minimum stop distance (quote currency) a candidate must offer.
    pub min_stop_usd: f64,
    pub stop_pivot_atr_buffer: f64,
    pub stop_zone_atr_buffer: f64,
    pub stop_atr_safe: f64,
    pub stop_atr_unsafe: f64,
    pub stop_min_pct: f64,
    pub stop_max_pct: f64,
    pub tp_liquidity_min_rr: f64,
    pub tp_pivot_min_rr: f64,
    /// Dynamic R:R ladder indexed by preliminary confidence.
    pub rr_ladder: [f64; 4],
    pub min_profit_pct: f64,
}

impl Default for ScalpConfig {
    fn default() -> Self {
        Self {
            zone_search_atr_mult: 6.0,
            momentum_penalty: 20,
            rsi_force_long_below: 55.0,
            rsi_force_short_above: 45.0,
            min_stop_usd: 3.0,
            stop_pivot_atr_buffer: 0.25,
            stop_zone_atr_buffer: 0.6,
            stop_atr_safe: 0.8,
            stop_atr_unsafe: 1.2,
            stop_min_pct: 0.3,
            stop_max_pct: 0.8,
            tp_liquidity_min_rr: 1.2,
            tp_pivot_min_rr: 1.3,
            rr_ladder: [1.5, 1.8, 2.0, 2.5],
            min_profit_pct: 0.6,
        }
    }
}

/// Swing trade construction thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwingConfig {
    /// Swing-scale ATR multiplier over the scalp ATR.
    pub atr_mult: f64,
    /// Floor for the swing-scale ATR (quote currency).
    pub min_atr_usd: f64,
    pub stop_buffer_atr: f64,
    pub min_stop_pct: f64,
    pub tp_max_pct: f64,
    pub tp_atr_cap: f64,
    pub fallback_rr: f64,
    pub min_profit_pct: f64,
    pub base_confidence_strong: i32,
    pub base_confidence_weak: i32,
}

impl Default for SwingConfig {
    fn default() -> Self {
        Self {
            atr_mult: 6.0,
            min_atr_usd: 30.0,
            stop_buffer_atr: 0.5,
            min_stop_pct: 0.5,
            tp_max_pct: 3.0,
            tp_atr_cap: 5.0,
            fallback_rr: 2.0,
            min_profit_pct: 1.2,
            base_confidence_strong: 80,
            base_confidence_weak: 60,
        }
    }
}

/// Top-level immutable configuration passed into every analysis call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub structure: StructureConfig,
    pub zones: ZoneConfig,
    pub liquidity: LiquidityConfig,
    pub volatility: VolatilityConfig,
    pub regime: RegimeConfig,
    pub scalp: ScalpConfig,
    pub swing: SwingConfig,
}

impl AnalysisConfig {
    /// Load defaults, then apply environment overrides for the cutoffs
    /// operators actually tune in the field.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        config.zones.min_confluence = parse_f64("ZONE_MIN_CONFLUENCE", config.zones.min_confluence)?;
        config.zones.min_strength = parse_f64("ZONE_MIN_STRENGTH", config.zones.min_strength)?;
        config.zones.max_distance_pct =
            parse_f64("ZONE_MAX_DISTANCE_PCT", config.zones.max_distance_pct)?;
        config.liquidity.level_proximity_usd = parse_f64(
            "LIQUIDITY_LEVEL_PROXIMITY_USD",
            config.liquidity.level_proximity_usd,
        )?;
        config.scalp.rsi_force_long_below =
            parse_f64("RSI_FORCE_LONG_BELOW", config.scalp.rsi_force_long_below)?;
        config.scalp.rsi_force_short_above =
            parse_f64("RSI_FORCE_SHORT_ABOVE", config.scalp.rsi_force_short_above)?;

        Ok(config)
    }
}

fn parse_f64(key: &str, default: f64) -> Result<f64> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse::<f64>()
        .context(format!("Failed to parse {}", key))
}
