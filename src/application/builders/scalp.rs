use tracing::debug;

use crate::application::builders::levels::{select_scalp_stop, select_scalp_target};
use crate::application::context::AnalysisContext;
use crate::config::AnalysisConfig;
use crate::domain::market::liquidity::LiquidityMap;
use crate::domain::market::regime::{ScalpBias, TrendBias, VolatilityState};
use crate::domain::market::structure::{BosKind, MarketStructure, MicroTrend, SweepKind, TrendState};
use crate::domain::market::zones::{Zone, ZoneAnalysis, ZoneKind};
use crate::domain::recommendation::TradeRecommendation;
use crate::domain::types::Direction;

/// Progress of one scalp construction attempt. The machine only moves
/// forward; an attempt that cannot leave `NoZone` is a NoTrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildStage {
    NoZone,
    ZoneFound,
    StructureChecked,
    MomentumChecked,
    PriceLevelsBuilt,
    ScoredComplete,
}

/// Builds the short-horizon recommendation around a validated zone.
pub struct ScalpBuilder<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> ScalpBuilder<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        ctx: &AnalysisContext,
        structure: &MarketStructure,
        zones: &ZoneAnalysis,
        liquidity: &LiquidityMap,
        regime: TrendState,
        volatility: &VolatilityState,
        bias: &TrendBias,
    ) -> TradeRecommendation {
        let scalp = &self.config.scalp;
        let atr = ctx.atr_effective();
        let scale = ctx.scale();
        let mut stage = BuildStage::NoZone;
        let mut reasoning = Vec::new();

        // Stage 1: a zone to trade from. Prefer the validated reaction
        // zone, fall back to the nearest raw zone within reach.
        let (zone, confluence) = match self.pick_zone(ctx, zones, atr) {
            Some(found) => found,
            None => {
                debug!(stage = ?stage, "scalp aborted: no actionable zone");
                return TradeRecommendation::no_trade("no actionable zone near price");
            }
        };
        stage = BuildStage::ZoneFound;
        debug!(stage = ?stage, "scalp zone selected");
        let direction = match zone.kind {
            ZoneKind::Demand => Direction::Buy,
            ZoneKind::Supply => Direction::Sell,
        };
        reasoning.push(format!(
            "{} zone {:.2}-{:.2} (strength {:.0}, confluence {:.0})",
            match zone.kind {
                ZoneKind::Demand => "demand",
                ZoneKind::Supply => "supply",
            },
            zone.low,
            zone.high,
            zone.strength,
            confluence,
        ));

        // Stage 2: structure check. Advisory only; an oversold/overbought
        // RSI at the zone overrides a disagreeing structure outright.
        let rsi_force = match direction {
            Direction::Buy => ctx.rsi < scalp.rsi_force_long_below,
            Direction::Sell => ctx.rsi > scalp.rsi_force_short_above,
            Direction::NoTrade => false,
        };
        let structure_agrees = rsi_force || self.structure_agrees(direction, structure, regime);
        let structure_note = if rsi_force {
            format!("RSI {:.0} overrides structure at the zone", ctx.rsi)
        } else if structure_agrees {
            format!("structure aligned ({})", structure.trend)
        } else {
            format!("counter-structure entry ({})", structure.trend)
        };
        stage = BuildStage::StructureChecked;
        debug!(stage = ?stage, structure_agrees, rsi_force, "scalp structure checked");

        // Stage 3: momentum check. Disagreement costs confidence later
        // but never blocks the trade.
        let momentum_agrees = match direction {
            Direction::Buy => ctx.macd_value >= ctx.macd_signal,
            Direction::Sell => ctx.macd_value <= ctx.macd_signal,
            Direction::NoTrade => true,
        };
        let momentum_note = if momentum_agrees {
            "momentum aligned".to_string()
        } else {
            "momentum disagrees".to_string()
        };
        stage = BuildStage::MomentumChecked;
        debug!(stage = ?stage, momentum_agrees, "scalp momentum checked");

        // Stage 4: price levels. Entry snaps to the most precise
        // overlapping feature; the range is always the zone itself.
        let (entry, entry_source, from_order_block) =
            self.pick_entry(direction, &zone, zones, liquidity);
        let (stop_loss, stop_source) = select_scalp_stop(
            direction,
            entry,
            &zone,
            &structure.pivots,
            atr,
            volatility.safe,
            scalp,
            &scale,
        );
        stage = BuildStage::PriceLevelsBuilt;
        debug!(stage = ?stage, entry, stop_loss, "scalp price levels built");

        // Stage 5: score, then resolve the target with the preliminary
        // confidence driving the R:R ladder.
        let preliminary = self.score(
            direction,
            &zone,
            confluence,
            structure_agrees,
            rsi_force,
            from_order_block,
            structure,
            liquidity,
            volatility,
            bias,
        );
        let (take_profit, target_source) = select_scalp_target(
            direction,
            entry,
            stop_loss,
            &structure.pivots,
            &liquidity.target,
            atr,
            preliminary,
            scalp,
        );
        let mut confidence = preliminary;
        if !momentum_agrees {
            confidence -= scalp.momentum_penalty;
        }
        let confidence = confidence.clamp(0, 100) as u8;
        stage = BuildStage::ScoredComplete;

        reasoning.push(format!("entry at {} {:.2}", entry_source, entry));
        reasoning.push(format!("stop from {} at {:.2}", stop_source, stop_loss));
        reasoning.push(format!("target from {} at {:.2}", target_source, take_profit));

        let liquidity_note = match direction {
            Direction::Buy => liquidity
                .target
                .above
                .map(|p| format!("liquidity above at {:.2}", p))
                .unwrap_or_else(|| "no liquidity magnet above".to_string()),
            _ => liquidity
                .target
                .below
                .map(|p| format!("liquidity below at {:.2}", p))
                .unwrap_or_else(|| "no liquidity magnet below".to_string()),
        };
        let volatility_note = if volatility.dangerous {
            "dangerous volatility".to_string()
        } else if volatility.fakeout_risk {
            "fakeout risk".to_string()
        } else if volatility.compression {
            "compressed range".to_string()
        } else {
            "volatility normal".to_string()
        };

        debug!(stage = ?stage, %direction, confidence, "scalp built");
        TradeRecommendation {
            direction,
            entry: Some(entry),
            entry_min: Some(zone.low),
            entry_max: Some(zone.high),
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
            confidence,
            reasoning,
            structure_note,
            liquidity_note,
            momentum_note,
            volatility_note,
        }
    }

    fn pick_zone(
        &self,
        ctx: &AnalysisContext,
        zones: &ZoneAnalysis,
        atr: f64,
    ) -> Option<(Zone, f64)> {
        if let Some(reaction) = &zones.reaction_zone
            && reaction.valid
        {
            return Some((reaction.zone.clone(), reaction.confluence));
        }
        let reach = self.config.scalp.zone_search_atr_mult * atr;
        zones
            .demand_zones
            .iter()
            .chain(zones.supply_zones.iter())
            .filter(|z| (z.midpoint() - ctx.price_f64).abs() <= reach)
            .min_by(|a, b| {
                let da = (a.midpoint() - ctx.price_f64).abs();
                let db = (b.midpoint() - ctx.price_f64).abs();
                da.total_cmp(&db)
            })
            .map(|z| (z.clone(), z.strength))
    }

    fn structure_agrees(
        &self,
        direction: Direction,
        structure: &MarketStructure,
        regime: TrendState,
    ) -> bool {
        match direction {
            Direction::Buy => {
                regime.is_bullish()
                    || structure.trend.is_bullish()
                    || structure.micro_trend == MicroTrend::Bullish
                    || matches!(structure.bos.map(|b| b.kind), Some(BosKind::Bullish))
            }
            Direction::Sell => {
                regime.is_bearish()
                    || structure.trend.is_bearish()
                    || structure.micro_trend == MicroTrend::Bearish
                    || matches!(structure.bos.map(|b| b.kind), Some(BosKind::Bearish))
            }
            Direction::NoTrade => false,
        }
    }

    /// Entry priority: overlapping order block, then overlapping FVG,
    /// then the zone midpoint.
    fn pick_entry(
        &self,
        direction: Direction,
        zone: &Zone,
        zones: &ZoneAnalysis,
        liquidity: &LiquidityMap,
    ) -> (f64, &'static str, bool) {
        let wants_bullish = direction == Direction::Buy;
        if let Some(ob) = liquidity
            .order_blocks
            .iter()
            .find(|ob| ob.bullish == wants_bullish && ob.overlaps(zone.low, zone.high))
        {
            return (ob.midpoint(), "order block", true);
        }
        if let Some(fvg) = &zones.fvg {
            let matches_side = match direction {
                Direction::Buy => fvg.kind == crate::domain::market::zones::FvgKind::Bullish,
                _ => fvg.kind == crate::domain::market::zones::FvgKind::Bearish,
            };
            if matches_side && fvg.low <= zone.high && fvg.high >= zone.low {
                return (fvg.midpoint(), "fair value gap", false);
            }
        }
        (zone.midpoint(), "zone midpoint", false)
    }

    /// Preliminary confidence before the momentum penalty.
    #[allow(clippy::too_many_arguments)]
    fn score(
        &self,
        direction: Direction,
        zone: &Zone,
        confluence: f64,
        structure_agrees: bool,
        rsi_force: bool,
        from_order_block: bool,
        structure: &MarketStructure,
        liquidity: &LiquidityMap,
        volatility: &VolatilityState,
        bias: &TrendBias,
    ) -> i32 {
        let zones_cfg = &self.config.zones;
        let mut score: i32 = 50;

        if confluence >= zones_cfg.min_confluence {
            score += 10;
        }
        if confluence >= 80.0 {
            score += 5;
        }
        if zone.strength >= zones_cfg.min_strength {
            score += 10;
        }
        if zone.strength >= 75.0 {
            score += 5;
        }
        if zone.untested {
            score += 5;
        } else if zone.test_count <= 2 {
            score += 3;
        }
        if structure_agrees {
            score += 10;
        }
        if rsi_force {
            score += 5;
        }
        if from_order_block {
            score += 5;
        }

        // A rejected sweep in the trade's favor is strong confirmation.
        if let Some(sweep) = structure.sweep
            && sweep.rejected
        {
            let favorable = match direction {
                Direction::Buy => sweep.kind == SweepKind::Low,
                Direction::Sell => sweep.kind == SweepKind::High,
                Direction::NoTrade => false,
            };
            if favorable {
                score += 8;
            }
        }

        let has_magnet = match direction {
            Direction::Buy => liquidity.target.above.is_some(),
            _ => liquidity.target.below.is_some(),
        };
        if has_magnet {
            score += 5;
        }

        if volatility.safe {
            score += 5;
        }
        if volatility.dangerous {
            score -= 10;
        }

        score += match (bias.scalp, direction) {
            (ScalpBias::PreferLong, Direction::Buy) => 5,
            (ScalpBias::PreferShort, Direction::Sell) => 5,
            (ScalpBias::PreferLong, Direction::Sell) => -5,
            (ScalpBias::PreferShort, Direction::Buy) => -5,
            _ => 0,
        };

        score.clamp(0, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::zones::ReactionZone;
    use crate::domain::types::Candle;
    use rust_decimal::Decimal;
    use rust_decimal::prelude::FromPrimitive;

    fn candle(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            open: Decimal::from_f64(open).unwrap(),
            high: Decimal::from_f64(high).unwrap(),
            low: Decimal::from_f64(low).unwrap(),
            close: Decimal::from_f64(close).unwrap(),
            volume: 1000.0,
            timestamp: 0,
        }
    }

    fn demand_zone(low: f64, high: f64, strength: f64) -> Zone {
        Zone {
            kind: ZoneKind::Demand,
            high,
            low,
            strength,
            distance_pct: 0.4,
            untested: true,
            test_count: 0,
            reaction_speed: 3,
            move_pct: 0.8,
        }
    }

    fn bare_structure() -> MarketStructure {
        MarketStructure {
            trend: TrendState::WeakUptrend,
            bos: None,
            choch: None,
            sweep: None,
            stop_hunt: false,
            pivots: Vec::new(),
            micro_trend: MicroTrend::Neutral,
        }
    }

    fn empty_zones() -> ZoneAnalysis {
        ZoneAnalysis {
            demand_zones: Vec::new(),
            supply_zones: Vec::new(),
            fvg: None,
            imbalances: Vec::new(),
            rejection_wicks: Vec::new(),
            nearest_zone: None,
            reaction_zone: None,
        }
    }

    fn empty_liquidity() -> LiquidityMap {
        LiquidityMap {
            levels: Vec::new(),
            stop_clusters: Vec::new(),
            sweep_zones: Vec::new(),
            breaker_blocks: Vec::new(),
            order_blocks: Vec::new(),
            volume_pockets: Vec::new(),
            target: Default::default(),
        }
    }

    fn calm_volatility() -> VolatilityState {
        VolatilityState {
            atr: 50.0,
            compression: false,
            expansion: false,
            wicky_market: false,
            extreme_move: false,
            fakeout_risk: false,
            dangerous: false,
            safe: true,
        }
    }

    fn ctx(price: f64) -> AnalysisContext {
        let candles = vec![candle(price, price + 10.0, price - 10.0, price); 120];
        let mut ctx =
            AnalysisContext::new("TEST", candles, Decimal::from_f64(price).unwrap());
        ctx.atr = 50.0;
        ctx
    }

    fn neutral_bias() -> TrendBias {
        TrendBias {
            swing: crate::domain::market::regime::SwingBias::LongOnly,
            scalp: ScalpBias::Both,
        }
    }

    #[test]
    fn test_no_zone_means_no_trade() {
        let config = AnalysisConfig::default();
        let builder = ScalpBuilder::new(&config);
        let rec = builder.build(
            &ctx(50_000.0),
            &bare_structure(),
            &empty_zones(),
            &empty_liquidity(),
            TrendState::Range,
            &calm_volatility(),
            &neutral_bias(),
        );
        assert_eq!(rec.direction, Direction::NoTrade);
        assert!(rec.entry.is_none());
    }

    #[test]
    fn test_demand_reaction_zone_builds_ordered_buy() {
        let config = AnalysisConfig::default();
        let builder = ScalpBuilder::new(&config);
        let zone = demand_zone(49_700.0, 49_900.0, 70.0);
        let mut zones = empty_zones();
        zones.reaction_zone = Some(ReactionZone {
            zone: zone.clone(),
            confluence: 75.0,
            valid: true,
        });
        zones.demand_zones = vec![zone];

        let rec = builder.build(
            &ctx(50_000.0),
            &bare_structure(),
            &zones,
            &empty_liquidity(),
            TrendState::WeakUptrend,
            &calm_volatility(),
            &neutral_bias(),
        );
        assert_eq!(rec.direction, Direction::Buy);
        let entry = rec.entry.unwrap();
        let stop = rec.stop_loss.unwrap();
        let tp = rec.take_profit.unwrap();
        assert!(stop < entry && entry < tp);
        assert_eq!(rec.entry_min, Some(49_700.0));
        assert_eq!(rec.entry_max, Some(49_900.0));
        assert!(rec.confidence > 0 && rec.confidence <= 100);
    }

    #[test]
    fn test_supply_zone_builds_ordered_sell() {
        let config = AnalysisConfig::default();
        let builder = ScalpBuilder::new(&config);
        let mut zone = demand_zone(50_100.0, 50_300.0, 70.0);
        zone.kind = ZoneKind::Supply;
        let mut zones = empty_zones();
        zones.reaction_zone = Some(ReactionZone {
            zone: zone.clone(),
            confluence: 70.0,
            valid: true,
        });
        zones.supply_zones = vec![zone];

        let mut context = ctx(50_000.0);
        context.rsi = 60.0;
        let rec = builder.build(
            &context,
            &bare_structure(),
            &zones,
            &empty_liquidity(),
            TrendState::WeakDowntrend,
            &calm_volatility(),
            &neutral_bias(),
        );
        assert_eq!(rec.direction, Direction::Sell);
        let entry = rec.entry.unwrap();
        assert!(rec.take_profit.unwrap() < entry);
        assert!(rec.stop_loss.unwrap() > entry);
    }

    #[test]
    fn test_momentum_disagreement_costs_confidence() {
        let config = AnalysisConfig::default();
        let builder = ScalpBuilder::new(&config);
        let zone = demand_zone(49_700.0, 49_900.0, 70.0);
        let mut zones = empty_zones();
        zones.reaction_zone = Some(ReactionZone {
            zone: zone.clone(),
            confluence: 75.0,
            valid: true,
        });
        zones.demand_zones = vec![zone];

        let mut aligned = ctx(50_000.0);
        aligned.macd_value = 1.0;
        aligned.macd_signal = 0.5;
        let mut against = ctx(50_000.0);
        against.macd_value = -1.0;
        against.macd_signal = 0.5;

        let structure = bare_structure();
        let vol = calm_volatility();
        let bias = neutral_bias();
        let liq = empty_liquidity();
        let rec_aligned = builder.build(
            &aligned,
            &structure,
            &zones,
            &liq,
            TrendState::WeakUptrend,
            &vol,
            &bias,
        );
        let rec_against = builder.build(
            &against,
            &structure,
            &zones,
            &liq,
            TrendState::WeakUptrend,
            &vol,
            &bias,
        );
        assert_eq!(
            rec_aligned.confidence as i32 - rec_against.confidence as i32,
            config.scalp.momentum_penalty
        );
        // The trade still stands.
        assert_eq!(rec_against.direction, Direction::Buy);
    }

    #[test]
    fn test_order_block_entry_takes_priority() {
        let config = AnalysisConfig::default();
        let builder = ScalpBuilder::new(&config);
        let zone = demand_zone(49_700.0, 49_900.0, 70.0);
        let mut zones = empty_zones();
        zones.reaction_zone = Some(ReactionZone {
            zone: zone.clone(),
            confluence: 75.0,
            valid: true,
        });
        zones.demand_zones = vec![zone];

        let mut liq = empty_liquidity();
        liq.order_blocks = vec![crate::domain::market::liquidity::OrderBlock {
            high: 49_850.0,
            low: 49_750.0,
            bullish: true,
            move_pct: 1.0,
            strength: 10.0,
        }];

        let rec = builder.build(
            &ctx(50_000.0),
            &bare_structure(),
            &zones,
            &liq,
            TrendState::WeakUptrend,
            &calm_volatility(),
            &neutral_bias(),
        );
        assert_eq!(rec.entry, Some(49_800.0));
        assert!(rec.reasoning.iter().any(|r| r.contains("order block")));
    }

    #[test]
    fn test_nearest_raw_zone_fallback() {
        let config = AnalysisConfig::default();
        let builder = ScalpBuilder::new(&config);
        let mut zones = empty_zones();
        // No validated reaction zone; a raw demand zone within 6 ATR.
        zones.demand_zones = vec![demand_zone(49_800.0, 49_950.0, 60.0)];

        let rec = builder.build(
            &ctx(50_000.0),
            &bare_structure(),
            &zones,
            &empty_liquidity(),
            TrendState::WeakUptrend,
            &calm_volatility(),
            &neutral_bias(),
        );
        assert_eq!(rec.direction, Direction::Buy);
    }
}
