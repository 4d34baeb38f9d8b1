use tracing::debug;

use crate::application::context::AnalysisContext;
use crate::config::RegimeConfig;
use crate::domain::market::structure::{MarketStructure, PivotKind, TrendState};

/// Regime classification from indicator alignment and pivot mapping.
///
/// A weighted integer score partitions into the same five states the
/// structure analyzer uses; exactly one state is always assigned.
pub struct RegimeClassifier<'a> {
    config: &'a RegimeConfig,
}

impl<'a> RegimeClassifier<'a> {
    pub fn new(config: &'a RegimeConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, ctx: &AnalysisContext, structure: &MarketStructure) -> TrendState {
        let mut score: i32 = 0;

        // Moving-average stacking.
        if ctx.ma20 > 0.0 && ctx.ma50 > 0.0 && ctx.ma100 > 0.0 {
            if ctx.ma20 > ctx.ma50 && ctx.ma50 > ctx.ma100 {
                score += 3;
            } else if ctx.ma20 < ctx.ma50 && ctx.ma50 < ctx.ma100 {
                score -= 3;
            } else if ctx.ma20 > ctx.ma50 {
                score += 1;
            } else if ctx.ma20 < ctx.ma50 {
                score -= 1;
            }
        }

        // Price against the short MA.
        if ctx.ma20 > 0.0 {
            if ctx.price_f64 > ctx.ma20 {
                score += 1;
            } else if ctx.price_f64 < ctx.ma20 {
                score -= 1;
            }
        }

        // RSI band.
        if ctx.rsi > self.config.rsi_upper {
            score += 1;
        } else if ctx.rsi < self.config.rsi_lower {
            score -= 1;
        }

        // MACD sign.
        if ctx.macd_value > 0.0 {
            score += 1;
        } else if ctx.macd_value < 0.0 {
            score -= 1;
        }

        // Candle-count dominance over the recent window.
        let window = self.config.dominance_window.min(ctx.candles.len());
        let bullish = ctx.candles[..window].iter().filter(|c| c.is_bullish()).count();
        let bearish = ctx.candles[..window].iter().filter(|c| c.is_bearish()).count();
        if bullish >= bearish + self.config.dominance_margin {
            score += 1;
        } else if bearish >= bullish + self.config.dominance_margin {
            score -= 1;
        }

        // Pivot mapping: higher highs and higher lows, or the mirror.
        let highs: Vec<f64> = structure
            .pivots
            .iter()
            .filter(|p| p.kind == PivotKind::High)
            .take(2)
            .map(|p| p.price)
            .collect();
        let lows: Vec<f64> = structure
            .pivots
            .iter()
            .filter(|p| p.kind == PivotKind::Low)
            .take(2)
            .map(|p| p.price)
            .collect();
        if highs.len() == 2 && lows.len() == 2 {
            if highs[0] > highs[1] && lows[0] > lows[1] {
                score += 2;
            } else if highs[0] < highs[1] && lows[0] < lows[1] {
                score -= 2;
            }
        }

        let regime = if score >= self.config.strong_score {
            TrendState::StrongUptrend
        } else if score >= self.config.weak_score {
            TrendState::WeakUptrend
        } else if score <= -self.config.strong_score {
            TrendState::StrongDowntrend
        } else if score <= -self.config.weak_score {
            TrendState::WeakDowntrend
        } else {
            TrendState::Range
        };

        debug!(score, regime = %regime, "regime classified");
        regime
    }
}
