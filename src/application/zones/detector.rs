use tracing::debug;

use crate::application::context::AnalysisContext;
use crate::config::ZoneConfig;
use crate::domain::errors::AnalysisError;
use crate::domain::market::zones::{
    FvgKind, FvgSignal, Imbalance, RejectionWick, Zone, ZoneAnalysis, ZoneKind,
};
use crate::domain::types::Candle;

use super::reaction::at_reaction_zone;

/// How many of the freshest candles are scanned for imbalances, wicks
/// and fair value gaps.
const PATTERN_LOOKBACK: usize = 20;
const FVG_LOOKBACK: usize = 30;

/// Zone detection stage: demand/supply zones, fair value gaps,
/// imbalances, rejection wicks and reaction-zone validation.
pub struct ZoneDetector<'a> {
    config: &'a ZoneConfig,
}

impl<'a> ZoneDetector<'a> {
    pub fn new(config: &'a ZoneConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, ctx: &AnalysisContext) -> Result<ZoneAnalysis, AnalysisError> {
        if ctx.candles.len() < self.config.min_candles {
            return Err(AnalysisError::InsufficientData {
                stage: "zone detection",
                needed: self.config.min_candles,
                got: ctx.candles.len(),
            });
        }

        let demand_zones = self.detect_zones(ctx, ZoneKind::Demand);
        let supply_zones = self.detect_zones(ctx, ZoneKind::Supply);
        let fvg = self.detect_fvg(ctx);
        let imbalances = self.detect_imbalances(&ctx.candles);
        let rejection_wicks = self.detect_rejection_wicks(&ctx.candles);

        let nearest_zone = demand_zones
            .iter()
            .chain(supply_zones.iter())
            .min_by(|a, b| a.distance_pct.total_cmp(&b.distance_pct))
            .cloned();

        let mut analysis = ZoneAnalysis {
            demand_zones,
            supply_zones,
            fvg,
            imbalances,
            rejection_wicks,
            nearest_zone,
            reaction_zone: None,
        };
        analysis.reaction_zone = at_reaction_zone(ctx, &analysis, self.config);

        debug!(
            demand = analysis.demand_zones.len(),
            supply = analysis.supply_zones.len(),
            fvg = analysis.fvg.is_some(),
            reaction = analysis.reaction_zone.is_some(),
            "zones resolved"
        );

        Ok(analysis)
    }

    /// Scan base candles for zones of the given kind. A base qualifies
    /// when one of the next few candles moved away from it by the
    /// configured minimum; the zone spans the base candle's range.
    fn detect_zones(&self, ctx: &AnalysisContext, kind: ZoneKind) -> Vec<Zone> {
        let candles = &ctx.candles;
        let price = ctx.price_f64;
        if price <= 0.0 {
            return Vec::new();
        }

        let avg_volume = average_volume(candles, 50);
        let scan_end = self
            .config
            .scan_limit
            .min(candles.len().saturating_sub(self.config.scan_start));

        let mut zones: Vec<Zone> = Vec::new();
        for base_idx in self.config.scan_start..scan_end {
            let base = &candles[base_idx];
            let anchor = match kind {
                ZoneKind::Demand => base.low_f64(),
                ZoneKind::Supply => base.high_f64(),
            };
            if anchor <= 0.0 {
                continue;
            }

            // First qualifying move wins; newer candles sit at lower
            // indices.
            let mut qualified: Option<(usize, f64)> = None;
            for ahead in self.config.reaction_min_candles..=self.config.reaction_max_candles {
                if ahead > base_idx {
                    break;
                }
                let follower = &candles[base_idx - ahead];
                let move_pct = match kind {
                    ZoneKind::Demand => (follower.high_f64() - anchor) / anchor * 100.0,
                    ZoneKind::Supply => (anchor - follower.low_f64()) / anchor * 100.0,
                };
                if move_pct >= self.config.min_move_pct {
                    qualified = Some((ahead, move_pct));
                    break;
                }
            }
            let Some((reaction_speed, move_pct)) = qualified else {
                continue;
            };

            let high = base.high_f64();
            let low = base.low_f64();
            let midpoint = (high + low) / 2.0;

            // Only zones on the tradeable side of price survive.
            let in_range = match kind {
                ZoneKind::Demand => {
                    midpoint <= price
                        && (price - midpoint) / price * 100.0 <= self.config.max_distance_pct
                }
                ZoneKind::Supply => {
                    midpoint >= price
                        && (midpoint - price) / price * 100.0 <= self.config.max_distance_pct
                }
            };
            if !in_range {
                continue;
            }

            let move_candle_idx = base_idx - reaction_speed;
            let test_count = count_tests(&candles[..move_candle_idx], low, high);
            let strength = self.score_zone(
                base,
                candles,
                price,
                avg_volume,
                kind,
                move_pct,
                reaction_speed,
                test_count,
                move_candle_idx,
            );

            let zone = Zone {
                kind,
                high,
                low,
                strength,
                distance_pct: (price - midpoint).abs() / price * 100.0,
                untested: test_count == 0,
                test_count,
                reaction_speed,
                move_pct,
            };

            // Overlapping zones collapse onto the first one found.
            if !zones.iter().any(|z| z.low <= zone.high && z.high >= zone.low) {
                zones.push(zone);
            }
        }

        zones.sort_by(|a, b| {
            a.distance_pct
                .total_cmp(&b.distance_pct)
                .then(b.strength.total_cmp(&a.strength))
        });
        zones.truncate(self.config.max_zones);
        zones
    }

    /// Composite strength score for one zone candidate.
    #[allow(clippy::too_many_arguments)]
    fn score_zone(
        &self,
        base: &Candle,
        candles: &[Candle],
        price: f64,
        avg_volume: f64,
        kind: ZoneKind,
        move_pct: f64,
        reaction_speed: usize,
        test_count: u32,
        move_candle_idx: usize,
    ) -> f64 {
        let mut strength = self.config.base_strength;

        // Bigger departures from the base mean stronger zones.
        if move_pct >= 1.5 {
            strength += 20.0;
        } else if move_pct >= 0.8 {
            strength += 12.0;
        } else if move_pct >= 0.5 {
            strength += 6.0;
        }

        // Fast reactions.
        if reaction_speed <= 4 {
            strength += 10.0;
        } else if reaction_speed <= 6 {
            strength += 5.0;
        }

        // Volume of the base candle against the recent average.
        if avg_volume > 0.0 {
            if base.volume > avg_volume * 1.5 {
                strength += 10.0;
            } else if base.volume > avg_volume {
                strength += 5.0;
            } else if base.volume < avg_volume * 0.5 {
                strength -= 5.0;
            }
        }

        // Untested zones are best; a few retests are fine, more erode it.
        if test_count == 0 {
            strength += 15.0;
        } else if test_count <= 2 {
            strength += 8.0;
        } else if test_count > 3 {
            strength -= 10.0;
        }

        // Tight bases hold better than sprawling ones.
        let height_pct = base.range() / price * 100.0;
        if height_pct < 0.15 {
            strength += 5.0;
        } else if height_pct > 0.5 {
            strength -= 5.0;
        }

        // Continuation after the qualifying move.
        if move_candle_idx > 0 {
            let next = &candles[move_candle_idx - 1];
            let continued = match kind {
                ZoneKind::Demand => next.is_bullish(),
                ZoneKind::Supply => next.is_bearish(),
            };
            if continued {
                strength += 5.0;
            }
        }

        strength.clamp(0.0, 100.0)
    }

    /// Most recent three-bar gap the middle candle left unfilled.
    fn detect_fvg(&self, ctx: &AnalysisContext) -> Option<FvgSignal> {
        let candles = &ctx.candles;
        let min_gap_pct = ctx.scale().usd_as_pct(self.config.fvg_min_gap_usd);
        let limit = FVG_LOOKBACK.min(candles.len());

        for i in 2..limit {
            let newer = &candles[i - 2];
            let older = &candles[i];

            // Gap up: the newer candle's low never reached the older high.
            let gap_up = newer.low_f64() - older.high_f64();
            if gap_up > 0.0 && ctx.scale().usd_as_pct(gap_up) > min_gap_pct {
                return Some(FvgSignal {
                    kind: FvgKind::Bullish,
                    high: newer.low_f64(),
                    low: older.high_f64(),
                });
            }

            let gap_down = older.low_f64() - newer.high_f64();
            if gap_down > 0.0 && ctx.scale().usd_as_pct(gap_down) > min_gap_pct {
                return Some(FvgSignal {
                    kind: FvgKind::Bearish,
                    high: older.low_f64(),
                    low: newer.high_f64(),
                });
            }
        }
        None
    }

    fn detect_imbalances(&self, candles: &[Candle]) -> Vec<Imbalance> {
        candles
            .iter()
            .take(PATTERN_LOOKBACK)
            .filter(|c| c.range() > 0.0 && c.body() / c.range() > self.config.imbalance_body_ratio)
            .map(|c| Imbalance {
                high: c.high_f64(),
                low: c.low_f64(),
                bullish: c.is_bullish(),
            })
            .collect()
    }

    fn detect_rejection_wicks(&self, candles: &[Candle]) -> Vec<RejectionWick> {
        let ratio = self.config.rejection_wick_ratio;
        let mut wicks = Vec::new();
        for c in candles.iter().take(PATTERN_LOOKBACK) {
            let body = c.body();
            if body <= 0.0 {
                continue;
            }
            if c.lower_wick() > ratio * body {
                wicks.push(RejectionWick {
                    level: c.low_f64(),
                    bullish: true,
                });
            } else if c.upper_wick() > ratio * body {
                wicks.push(RejectionWick {
                    level: c.high_f64(),
                    bullish: false,
                });
            }
        }
        wicks
    }
}

/// Mean volume over the freshest `window` candles; 0 when unavailable.
fn average_volume(candles: &[Candle], window: usize) -> f64 {
    let window = window.min(candles.len());
    if window == 0 {
        return 0.0;
    }
    candles[..window].iter().map(|c| c.volume).sum::<f64>() / window as f64
}

/// Candles newer than the qualifying move that traded back into the zone.
fn count_tests(newer_candles: &[Candle], low: f64, high: f64) -> u32 {
    newer_candles
        .iter()
        .filter(|c| c.low_f64() <= high && c.high_f64() >= low)
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    fn candle(open: f64, high: f64, low: f64, close: f64, volume: f64) -> Candle {
        Candle {
            open: Decimal::from_f64(open).unwrap(),
            high: Decimal::from_f64(high).unwrap(),
            low: Decimal::from_f64(low).unwrap(),
            close: Decimal::from_f64(close).unwrap(),
            volume,
            timestamp: 0,
        }
    }

    fn flat(price: f64) -> Candle {
        candle(price, price + 0.2, price - 0.2, price, 1000.0)
    }

    fn ctx_with(candles: Vec<Candle>, price: f64) -> AnalysisContext {
        let mut ctx = AnalysisContext::new(
            "TEST",
            candles,
            Decimal::from_f64(price).unwrap(),
        );
        ctx.atr = price * 0.005;
        ctx
    }

    #[test]
    fn test_faults_below_minimum() {
        let config = ZoneConfig::default();
        let detector = ZoneDetector::new(&config);
        let ctx = ctx_with(vec![flat(100.0); 40], 100.0);
        assert!(detector.detect(&ctx).is_err());
    }

    #[test]
    fn test_demand_zone_below_price() {
        let config = ZoneConfig::default();
        let detector = ZoneDetector::new(&config);

        // Base candle at index 15 dips to 99.0; the candle 3 bars newer
        // rallies well clear of the base low. Current price 100.
        let mut candles = vec![flat(100.0); 60];
        candles[15] = candle(99.4, 99.6, 99.0, 99.2, 2000.0);
        candles[12] = candle(99.5, 100.4, 99.4, 100.3, 1200.0);

        let ctx = ctx_with(candles, 100.0);
        let analysis = detector.detect(&ctx).unwrap();
        assert!(
            !analysis.demand_zones.is_empty(),
            "expected at least one demand zone"
        );
        let zone = &analysis.demand_zones[0];
        assert_eq!(zone.kind, ZoneKind::Demand);
        assert!(zone.high >= zone.low);
        assert!(zone.strength >= 0.0 && zone.strength <= 100.0);
        assert!(zone.midpoint() <= 100.0);
    }

    #[test]
    fn test_far_zone_is_discarded() {
        let config = ZoneConfig::default();
        let detector = ZoneDetector::new(&config);

        // The base is more than 2% below the current price.
        let mut candles = vec![flat(100.0); 60];
        candles[15] = candle(97.0, 97.2, 96.5, 96.8, 2000.0);
        candles[12] = candle(97.0, 97.9, 96.9, 97.8, 1200.0);

        let ctx = ctx_with(candles, 100.0);
        let analysis = detector.detect(&ctx).unwrap();
        assert!(
            analysis
                .demand_zones
                .iter()
                .all(|z| z.distance_pct <= config.max_distance_pct)
        );
    }

    #[test]
    fn test_bullish_fvg_detected() {
        let config = ZoneConfig::default();
        let detector = ZoneDetector::new(&config);

        // Older candle high 100.2, newer candle low 101.0: gap of 0.8.
        // Everything fresher holds the rally so no later gap appears.
        let mut candles = vec![flat(100.0); 60];
        candles[5] = candle(99.9, 100.2, 99.8, 100.1, 1000.0);
        candles[4] = candle(100.1, 101.5, 100.0, 101.4, 1500.0);
        candles[3] = candle(101.4, 102.0, 101.0, 101.8, 1000.0);
        for i in 0..3 {
            candles[i] = candle(101.4, 101.9, 100.9, 101.5, 1000.0);
        }

        let ctx = ctx_with(candles, 100.0);
        let analysis = detector.detect(&ctx).unwrap();
        let fvg = analysis.fvg.expect("expected a bullish FVG");
        assert_eq!(fvg.kind, FvgKind::Bullish);
        assert!((fvg.low - 100.2).abs() < 1e-9);
        assert!((fvg.high - 101.0).abs() < 1e-9);
    }

    #[test]
    fn test_imbalance_and_rejection_wick() {
        let config = ZoneConfig::default();
        let detector = ZoneDetector::new(&config);

        let mut candles = vec![flat(100.0); 60];
        // Body is 90% of the range.
        candles[2] = candle(100.0, 101.0, 99.95, 100.9, 1000.0);
        // Lower wick 1.0 against a 0.1 body.
        candles[6] = candle(100.0, 100.15, 99.0, 100.1, 1000.0);

        let ctx = ctx_with(candles, 100.0);
        let analysis = detector.detect(&ctx).unwrap();
        assert!(!analysis.imbalances.is_empty());
        assert!(
            analysis
                .rejection_wicks
                .iter()
                .any(|w| w.bullish && (w.level - 99.0).abs() < 1e-9)
        );
    }

    #[test]
    fn test_zone_strength_bounds_hold() {
        let config = ZoneConfig::default();
        let detector = ZoneDetector::new(&config);

        let mut candles = vec![flat(100.0); 120];
        for i in (12..90).step_by(7) {
            candles[i + 3] = candle(99.4, 99.6, 99.0, 99.2, 3000.0);
            candles[i] = candle(99.5, 100.6, 99.4, 100.5, 1200.0);
        }

        let ctx = ctx_with(candles, 100.0);
        let analysis = detector.detect(&ctx).unwrap();
        for zone in analysis.demand_zones.iter().chain(&analysis.supply_zones) {
            assert!(zone.high >= zone.low);
            assert!((0.0..=100.0).contains(&zone.strength));
        }
        assert!(analysis.demand_zones.len() <= config.max_zones);
    }
}
