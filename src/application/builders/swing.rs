use tracing::debug;

use crate::application::builders::levels::{select_swing_stop, select_swing_target};
use crate::application::context::AnalysisContext;
use crate::config::AnalysisConfig;
use crate::domain::market::liquidity::LiquidityMap;
use crate::domain::market::regime::{SwingBias, TrendBias, VolatilityState};
use crate::domain::market::structure::{
    BosKind, ChochKind, MarketStructure, MicroTrend, TrendState,
};
use crate::domain::recommendation::TradeRecommendation;
use crate::domain::types::Direction;

/// Builds the longer-horizon recommendation. The swing bias is a hard
/// gate: without a directional bias there is no swing trade.
pub struct SwingBuilder<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> SwingBuilder<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn build(
        &self,
        ctx: &AnalysisContext,
        structure: &MarketStructure,
        liquidity: &LiquidityMap,
        regime: TrendState,
        volatility: &VolatilityState,
        bias: &TrendBias,
    ) -> TradeRecommendation {
        let swing = &self.config.swing;
        let direction = match bias.swing {
            SwingBias::LongOnly => Direction::Buy,
            SwingBias::ShortOnly => Direction::Sell,
            SwingBias::NoTrade => {
                debug!("swing aborted: no directional bias");
                return TradeRecommendation::no_trade("no clear trend");
            }
        };

        let scale = ctx.scale();
        let entry = ctx.price_f64;
        // Swing-scale ATR: a multiple of the bar ATR with an absolute
        // floor so quiet markets still get room to breathe.
        let swing_atr = (swing.atr_mult * ctx.atr_effective())
            .max(scale.pct_as_abs(scale.usd_as_pct(swing.min_atr_usd)));

        let (stop_loss, stop_source) =
            select_swing_stop(direction, entry, &structure.pivots, swing_atr, swing);
        let (take_profit, target_source) = select_swing_target(
            direction,
            entry,
            stop_loss,
            &structure.pivots,
            &liquidity.target,
            swing_atr,
            swing,
        );

        let mut confidence: i32 = if regime.is_strong() {
            swing.base_confidence_strong
        } else {
            swing.base_confidence_weak
        };
        let mut reasoning = vec![format!("swing bias {} ({})", direction, regime)];

        if let Some(bos) = structure.bos {
            let favorable = match direction {
                Direction::Buy => bos.kind == BosKind::Bullish,
                _ => bos.kind == BosKind::Bearish,
            };
            if favorable {
                confidence += 5;
                reasoning.push("break of structure confirms direction".to_string());
            }
        }
        if let Some(choch) = structure.choch {
            let favorable = match direction {
                Direction::Buy => choch.kind == ChochKind::Bullish,
                _ => choch.kind == ChochKind::Bearish,
            };
            if favorable {
                confidence += 5;
                reasoning.push("change of character confirms direction".to_string());
            }
        }
        let micro_favorable = match direction {
            Direction::Buy => structure.micro_trend == MicroTrend::Bullish,
            _ => structure.micro_trend == MicroTrend::Bearish,
        };
        if micro_favorable {
            confidence += 3;
        }
        let magnet = match direction {
            Direction::Buy => liquidity.target.above,
            _ => liquidity.target.below,
        };
        if magnet.is_some() {
            confidence += 5;
        }
        let confidence = confidence.clamp(0, 100) as u8;

        reasoning.push(format!("stop from {} at {:.2}", stop_source, stop_loss));
        reasoning.push(format!("target from {} at {:.2}", target_source, take_profit));

        let liquidity_note = magnet
            .map(|p| format!("liquidity magnet at {:.2}", p))
            .unwrap_or_else(|| "no clear liquidity magnet".to_string());
        let momentum_note = if ctx.macd_value > ctx.macd_signal {
            "MACD above signal".to_string()
        } else if ctx.macd_value < ctx.macd_signal {
            "MACD below signal".to_string()
        } else {
            "MACD flat".to_string()
        };
        let volatility_note = if volatility.dangerous {
            "dangerous volatility".to_string()
        } else if volatility.compression {
            "compressed range".to_string()
        } else {
            "volatility normal".to_string()
        };

        debug!(%direction, confidence, "swing built");
        TradeRecommendation {
            direction,
            entry: Some(entry),
            entry_min: None,
            entry_max: None,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
            confidence,
            reasoning,
            structure_note: format!("trend {}", structure.trend),
            liquidity_note,
            momentum_note,
            volatility_note,
        }
    }
}
