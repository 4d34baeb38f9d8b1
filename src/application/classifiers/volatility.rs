use tracing::debug;

use crate::application::context::AnalysisContext;
use crate::config::VolatilityConfig;
use crate::domain::market::regime::VolatilityState;
use crate::domain::types::Candle;

/// Volatility flags from ATR-to-average-range ratios and wick geometry.
pub struct VolatilityAnalyzer<'a> {
    config: &'a VolatilityConfig,
}

impl<'a> VolatilityAnalyzer<'a> {
    pub fn new(config: &'a VolatilityConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, ctx: &AnalysisContext) -> VolatilityState {
        let atr = ctx.atr;
        let long_range = average_range(&ctx.candles, self.config.long_window);
        let short_range = average_range(&ctx.candles, self.config.short_window);

        let compression = long_range > 0.0 && atr < self.config.compression_ratio * long_range;
        let expansion = long_range > 0.0 && atr > self.config.expansion_ratio * long_range;
        let wicky_market = self.is_wicky(&ctx.candles);
        let extreme_move = long_range > 0.0 && short_range > self.config.extreme_ratio * long_range;

        // Kept in the original (redundant) form so the tuned behavior is
        // preserved exactly.
        let dangerous = expansion && wicky_market && (wicky_market || extreme_move);
        let fakeout_risk = wicky_market || extreme_move;
        let safe = !dangerous && !extreme_move;

        let state = VolatilityState {
            atr,
            compression,
            expansion,
            wicky_market,
            extreme_move,
            fakeout_risk,
            dangerous,
            safe,
        };
        debug!(?state, "volatility analyzed");
        state
    }

    /// Average wick-to-body ratio over the recent window.
    fn is_wicky(&self, candles: &[Candle]) -> bool {
        let window = self.config.wick_window.min(candles.len());
        if window == 0 {
            return false;
        }
        let mut total = 0.0;
        let mut counted = 0usize;
        for c in &candles[..window] {
            let body = c.body();
            if body <= 0.0 {
                continue;
            }
            total += (c.upper_wick() + c.lower_wick()) / body;
            counted += 1;
        }
        counted > 0 && total / counted as f64 > self.config.wicky_ratio
    }
}

fn average_range(candles: &[Candle], window: usize) -> f64 {
    let window = window.min(candles.len());
    if window == 0 {
        return 0.0;
    }
    candles[..window].iter().map(|c| c.range()).sum::<f64>() / window as f64
}
