//! Stop-loss and take-profit selection.
//!
//! Each selector is an ordered list of independent candidate strategies;
//! the first candidate that passes its validity gate wins. The winning
//! source is reported so the recommendation can explain itself.

use crate::application::context::PriceScale;
use crate::config::{ScalpConfig, SwingConfig};
use crate::domain::market::liquidity::LiquidityTarget;
use crate::domain::market::structure::{Pivot, PivotKind};
use crate::domain::market::zones::Zone;
use crate::domain::types::Direction;

fn sign(direction: Direction) -> f64 {
    match direction {
        Direction::Sell => -1.0,
        _ => 1.0,
    }
}

/// Scalp stop chain: structural pivot beyond the zone, then the zone
/// boundary, then a plain ATR offset. The first candidate offering at
/// least the minimum distance wins; the ATR offset is the unconditional
/// fallback. The resulting distance is clamped to the configured
/// percent-of-entry band.
pub fn select_scalp_stop(
    direction: Direction,
    entry: f64,
    zone: &Zone,
    pivots: &[Pivot],
    atr: f64,
    volatility_safe: bool,
    config: &ScalpConfig,
    scale: &PriceScale,
) -> (f64, &'static str) {
    let s = sign(direction);
    let min_distance = scale.pct_as_abs(scale.usd_as_pct(config.min_stop_usd));

    let pivot_stop = opposing_pivot(direction, zone, pivots)
        .map(|p| p - s * config.stop_pivot_atr_buffer * atr);
    let zone_boundary = match direction {
        Direction::Sell => zone.high + config.stop_zone_atr_buffer * atr,
        _ => zone.low - config.stop_zone_atr_buffer * atr,
    };
    let atr_mult = if volatility_safe {
        config.stop_atr_safe
    } else {
        config.stop_atr_unsafe
    };
    let atr_stop = entry - s * atr_mult * atr;

    let candidates: [(Option<f64>, &'static str); 3] = [
        (pivot_stop, "structural pivot"),
        (Some(zone_boundary), "zone boundary"),
        (Some(atr_stop), "atr offset"),
    ];

    let mut chosen = (atr_stop, "atr offset");
    for (candidate, source) in candidates {
        let Some(stop) = candidate else { continue };
        let distance = s * (entry - stop);
        if distance >= min_distance {
            chosen = (stop, source);
            break;
        }
    }

    // Clamp the final distance into the scalp band.
    let raw_distance = (s * (entry - chosen.0)).max(0.0);
    let clamped = raw_distance.clamp(
        entry * config.stop_min_pct / 100.0,
        entry * config.stop_max_pct / 100.0,
    );
    (entry - s * clamped, chosen.1)
}

/// Scalp target chain: liquidity target, then structural pivot, then an
/// ATR multiple of the dynamic R:R, then a pure R:R fallback. The profit
/// distance is floored at the configured minimum.
#[allow(clippy::too_many_arguments)]
pub fn select_scalp_target(
    direction: Direction,
    entry: f64,
    stop_loss: f64,
    pivots: &[Pivot],
    liquidity: &LiquidityTarget,
    atr: f64,
    preliminary_confidence: i32,
    config: &ScalpConfig,
) -> (f64, &'static str) {
    let s = sign(direction);
    let risk = (s * (entry - stop_loss)).max(f64::EPSILON);
    let rr = dynamic_rr(preliminary_confidence, &config.rr_ladder);

    let liquidity_target = match direction {
        Direction::Sell => liquidity.below,
        _ => liquidity.above,
    };
    let pivot_target = target_pivot(direction, entry, pivots);

    let mut chosen: Option<(f64, &'static str)> = None;
    if let Some(tp) = liquidity_target
        && s * (tp - entry) / risk >= config.tp_liquidity_min_rr
    {
        chosen = Some((tp, "liquidity target"));
    }
    if chosen.is_none()
        && let Some(tp) = pivot_target
        && s * (tp - entry) / risk >= config.tp_pivot_min_rr
    {
        chosen = Some((tp, "structural pivot"));
    }
    let (mut take_profit, source) = chosen.unwrap_or_else(|| {
        if atr > 0.0 {
            (entry + s * atr * rr, "atr multiple")
        } else {
            (entry + s * risk * rr, "risk multiple")
        }
    });

    let min_profit = entry * config.min_profit_pct / 100.0;
    if s * (take_profit - entry) < min_profit {
        take_profit = entry + s * min_profit;
    }
    (take_profit, source)
}

/// Swing stop: nearest opposing structural pivot buffered by the
/// swing-scale ATR, floored at the minimum percent distance.
pub fn select_swing_stop(
    direction: Direction,
    entry: f64,
    pivots: &[Pivot],
    swing_atr: f64,
    config: &SwingConfig,
) -> (f64, &'static str) {
    let s = sign(direction);

    let (raw, source) = match nearest_opposing_pivot(direction, entry, pivots) {
        Some(p) => (
            p - s * config.stop_buffer_atr * swing_atr,
            "structural pivot",
        ),
        None => (entry - s * swing_atr, "atr offset"),
    };

    let distance = (s * (entry - raw)).max(entry * config.min_stop_pct / 100.0);
    (entry - s * distance, source)
}

/// Swing target: liquidity target within the distance cap, then a
/// structural pivot, then the configured R:R fallback. The profit
/// distance is floored at the configured minimum.
pub fn select_swing_target(
    direction: Direction,
    entry: f64,
    stop_loss: f64,
    pivots: &[Pivot],
    liquidity: &LiquidityTarget,
    swing_atr: f64,
    config: &SwingConfig,
) -> (f64, &'static str) {
    let s = sign(direction);
    let risk = (s * (entry - stop_loss)).max(f64::EPSILON);
    let max_distance = (entry * config.tp_max_pct / 100.0).min(config.tp_atr_cap * swing_atr);

    let liquidity_target = match direction {
        Direction::Sell => liquidity.below,
        _ => liquidity.above,
    };

    let mut chosen: Option<(f64, &'static str)> = None;
    if let Some(tp) = liquidity_target {
        let distance = s * (tp - entry);
        if distance > 0.0 && distance <= max_distance {
            chosen = Some((tp, "liquidity target"));
        }
    }
    if chosen.is_none()
        && let Some(tp) = target_pivot(direction, entry, pivots)
    {
        chosen = Some((tp, "structural pivot"));
    }
    let (mut take_profit, source) =
        chosen.unwrap_or((entry + s * risk * config.fallback_rr, "risk multiple"));

    let min_profit = entry * config.min_profit_pct / 100.0;
    if s * (take_profit - entry) < min_profit {
        take_profit = entry + s * min_profit;
    }
    (take_profit, source)
}

/// Dynamic R:R ladder indexed by the preliminary confidence score.
pub fn dynamic_rr(confidence: i32, ladder: &[f64; 4]) -> f64 {
    if confidence < 55 {
        ladder[0]
    } else if confidence < 65 {
        ladder[1]
    } else if confidence < 75 {
        ladder[2]
    } else {
        ladder[3]
    }
}

/// Nearest pivot on the protective side of the zone.
fn opposing_pivot(direction: Direction, zone: &Zone, pivots: &[Pivot]) -> Option<f64> {
    match direction {
        Direction::Sell => pivots
            .iter()
            .filter(|p| p.kind == PivotKind::High && p.price > zone.high)
            .map(|p| p.price)
            .min_by(f64::total_cmp),
        _ => pivots
            .iter()
            .filter(|p| p.kind == PivotKind::Low && p.price < zone.low)
            .map(|p| p.price)
            .max_by(f64::total_cmp),
    }
}

/// Nearest pivot on the protective side of the entry itself.
fn nearest_opposing_pivot(direction: Direction, entry: f64, pivots: &[Pivot]) -> Option<f64> {
    match direction {
        Direction::Sell => pivots
            .iter()
            .filter(|p| p.kind == PivotKind::High && p.price > entry)
            .map(|p| p.price)
            .min_by(f64::total_cmp),
        _ => pivots
            .iter()
            .filter(|p| p.kind == PivotKind::Low && p.price < entry)
            .map(|p| p.price)
            .max_by(f64::total_cmp),
    }
}

/// Nearest pivot in the profit direction.
fn target_pivot(direction: Direction, entry: f64, pivots: &[Pivot]) -> Option<f64> {
    match direction {
        Direction::Sell => pivots
            .iter()
            .filter(|p| p.kind == PivotKind::Low && p.price < entry)
            .map(|p| p.price)
            .max_by(f64::total_cmp),
        _ => pivots
            .iter()
            .filter(|p| p.kind == PivotKind::High && p.price > entry)
            .map(|p| p.price)
            .min_by(f64::total_cmp),
    }
}
