use tracing::trace;

use crate::application::context::AnalysisContext;
use crate::config::ZoneConfig;
use crate::domain::market::zones::{ReactionZone, Zone, ZoneAnalysis, ZoneKind};

/// RSI levels considered extreme enough to validate a zone on their own.
const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;
/// Candidates are gathered within this many effective ATRs of price.
const EXTENSION_ATR: f64 = 3.0;
/// Price within this fraction of a moving average counts as MA support.
const MA_PROXIMITY_PCT: f64 = 0.5;

/// Validate whether current price sits in a tradeable reaction zone.
///
/// Each candidate zone near price gets a confluence score; the zone is
/// accepted when any of the acceptance rules fires. When nothing
/// validates, the single nearest zone is still returned if it lies
/// within twice the ATR-scaled distance.
pub fn at_reaction_zone(
    ctx: &AnalysisContext,
    analysis: &ZoneAnalysis,
    config: &ZoneConfig,
) -> Option<ReactionZone> {
    let price = ctx.price_f64;
    if price <= 0.0 {
        return None;
    }
    let atr = ctx.atr_effective();

    let mut best: Option<ReactionZone> = None;
    for zone in analysis.demand_zones.iter().chain(&analysis.supply_zones) {
        let distance = (price - zone.midpoint()).abs();
        if distance > EXTENSION_ATR * atr {
            continue;
        }

        let confluence = confluence_score(ctx, zone);
        let rsi_extreme = match zone.kind {
            ZoneKind::Demand => ctx.rsi <= RSI_OVERSOLD,
            ZoneKind::Supply => ctx.rsi >= RSI_OVERBOUGHT,
        };

        let accepted = zone.contains(price)
            || distance <= atr
            || (zone.strength >= 50.0 && distance <= 2.5 * atr)
            || rsi_extreme
            || confluence >= 0.7 * config.min_confluence
            || zone.strength >= 0.6 * config.min_strength;

        if accepted {
            let better = match &best {
                Some(current) => {
                    confluence > current.confluence
                        || (confluence == current.confluence
                            && zone.distance_pct < current.zone.distance_pct)
                }
                None => true,
            };
            if better {
                best = Some(ReactionZone {
                    zone: zone.clone(),
                    confluence,
                    valid: true,
                });
            }
        }
    }

    if best.is_some() {
        return best;
    }

    // Last resort: the nearest zone, if it is close enough to matter.
    let nearest = analysis.nearest_zone.as_ref()?;
    let distance = (price - nearest.midpoint()).abs();
    if distance <= 2.0 * atr {
        trace!(distance, "reaction zone fell back to nearest zone");
        return Some(ReactionZone {
            zone: nearest.clone(),
            confluence: confluence_score(ctx, nearest),
            valid: true,
        });
    }
    None
}

/// Zone strength plus indicator/MA/support-resistance alignment, 0..=100.
fn confluence_score(ctx: &AnalysisContext, zone: &Zone) -> f64 {
    let price = ctx.price_f64;
    let mut score = zone.strength;

    // RSI extremity.
    match zone.kind {
        ZoneKind::Demand => {
            if ctx.rsi < RSI_OVERSOLD {
                score += 20.0;
            } else if ctx.rsi < 40.0 {
                score += 10.0;
            }
        }
        ZoneKind::Supply => {
            if ctx.rsi > RSI_OVERBOUGHT {
                score += 20.0;
            } else if ctx.rsi > 60.0 {
                score += 10.0;
            }
        }
    }

    // Moving-average proximity.
    if near_pct(price, ctx.ma20, MA_PROXIMITY_PCT) || near_pct(price, ctx.ma50, MA_PROXIMITY_PCT) {
        score += 10.0;
    }

    // Caller-supplied support/resistance alignment.
    let aligned = match zone.kind {
        ZoneKind::Demand => ctx
            .support_levels
            .iter()
            .any(|s| near_pct(zone.midpoint(), *s, MA_PROXIMITY_PCT)),
        ZoneKind::Supply => ctx
            .resistance_levels
            .iter()
            .any(|r| near_pct(zone.midpoint(), *r, MA_PROXIMITY_PCT)),
    };
    if aligned {
        score += 10.0;
    }

    // Test history.
    if zone.untested {
        score += 10.0;
    } else if zone.test_count <= 2 {
        score += 5.0;
    }

    score.clamp(0.0, 100.0)
}

fn near_pct(a: f64, b: f64, pct: f64) -> bool {
    if b <= 0.0 {
        return false;
    }
    (a - b).abs() / b * 100.0 <= pct
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    fn zone(kind: ZoneKind, low: f64, high: f64, strength: f64, price: f64) -> Zone {
        Zone {
            kind,
            high,
            low,
            strength,
            distance_pct: (price - (high + low) / 2.0).abs() / price * 100.0,
            untested: true,
            test_count: 0,
            reaction_speed: 3,
            move_pct: 0.8,
        }
    }

    fn ctx(price: f64, rsi: f64, atr: f64) -> AnalysisContext {
        let mut ctx =
            AnalysisContext::new("TEST", Vec::new(), Decimal::from_f64(price).unwrap());
        ctx.rsi = rsi;
        ctx.atr = atr;
        ctx
    }

    fn analysis_with(zones: Vec<Zone>) -> ZoneAnalysis {
        let nearest = zones
            .iter()
            .min_by(|a, b| a.distance_pct.total_cmp(&b.distance_pct))
            .cloned();
        let (demand, supply) = zones
            .into_iter()
            .partition(|z| z.kind == ZoneKind::Demand);
        ZoneAnalysis {
            demand_zones: demand,
            supply_zones: supply,
            fvg: None,
            imbalances: Vec::new(),
            rejection_wicks: Vec::new(),
            nearest_zone: nearest,
            reaction_zone: None,
        }
    }

    #[test]
    fn test_price_inside_zone_is_accepted() {
        let config = ZoneConfig::default();
        let z = zone(ZoneKind::Demand, 99.0, 101.0, 20.0, 100.0);
        let analysis = analysis_with(vec![z]);
        let reaction = at_reaction_zone(&ctx(100.0, 50.0, 0.5), &analysis, &config)
            .expect("price inside zone must validate");
        assert!(reaction.valid);
        assert!(reaction.confluence <= 100.0);
    }

    #[test]
    fn test_rsi_extreme_validates_distant_demand_zone() {
        let config = ZoneConfig::default();
        // Zone midpoint 2.5 ATRs away, weak strength, but RSI is washed out.
        let z = zone(ZoneKind::Demand, 98.6, 98.9, 20.0, 100.0);
        let analysis = analysis_with(vec![z]);
        let reaction = at_reaction_zone(&ctx(100.0, 25.0, 0.5), &analysis, &config);
        assert!(reaction.is_some());
    }

    #[test]
    fn test_far_zone_without_confluence_is_rejected() {
        let config = ZoneConfig::default();
        // Midpoint ~4% away with a tiny ATR: outside every window.
        let z = zone(ZoneKind::Demand, 95.9, 96.1, 10.0, 100.0);
        let analysis = analysis_with(vec![z]);
        let reaction = at_reaction_zone(&ctx(100.0, 50.0, 0.2), &analysis, &config);
        assert!(reaction.is_none());
    }

    #[test]
    fn test_confluence_is_clamped() {
        let ctx = ctx(100.0, 20.0, 0.5);
        let z = zone(ZoneKind::Demand, 99.5, 100.5, 95.0, 100.0);
        assert!(confluence_score(&ctx, &z) <= 100.0);
    }
}
