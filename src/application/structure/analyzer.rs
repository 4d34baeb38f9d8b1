use tracing::debug;

use crate::config::StructureConfig;
use crate::domain::errors::AnalysisError;
use crate::domain::market::structure::{
    BosKind, BosSignal, ChochKind, ChochSignal, LiquiditySweep, MarketStructure, MicroTrend,
    Pivot, PivotKind, SweepKind, TrendState,
};
use crate::domain::types::Candle;

use super::pivots::{detect_pivots, latest_pivot};

/// Market structure stage: trend, BOS, CHOCH, liquidity sweep, stop hunt
/// and micro-trend, all derived from fractal pivots.
pub struct MarketStructureAnalyzer<'a> {
    config: &'a StructureConfig,
}

impl<'a> MarketStructureAnalyzer<'a> {
    pub fn new(config: &'a StructureConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, candles: &[Candle]) -> Result<MarketStructure, AnalysisError> {
        if candles.len() < self.config.min_candles {
            return Err(AnalysisError::InsufficientData {
                stage: "market structure",
                needed: self.config.min_candles,
                got: candles.len(),
            });
        }

        let pivots = detect_pivots(candles, self.config.pivot_lookaround)?;
        let bos = self.detect_bos(candles, &pivots);
        let choch = self.detect_choch(&pivots);
        let sweep = self.detect_sweep(candles, &pivots);
        let trend = self.classify_trend(candles, &pivots, bos, choch);
        let stop_hunt = self.detect_stop_hunt(candles);
        let micro_trend = self.micro_trend(candles);

        debug!(
            trend = %trend,
            bos = ?bos.map(|b| b.kind),
            choch = ?choch.map(|c| c.kind),
            pivots = pivots.len(),
            "market structure resolved"
        );

        Ok(MarketStructure {
            trend,
            bos,
            choch,
            sweep,
            stop_hunt,
            pivots,
            micro_trend,
        })
    }

    /// Break of structure: latest close beyond the latest swing point,
    /// judged over the most recent pivots.
    fn detect_bos(&self, candles: &[Candle], pivots: &[Pivot]) -> Option<BosSignal> {
        let recent = &pivots[..pivots.len().min(self.config.bos_pivot_window)];
        let close = candles[0].close_f64();
        if close <= 0.0 {
            return None;
        }

        let swing_high = recent.iter().find(|p| p.kind == PivotKind::High);
        let swing_low = recent.iter().find(|p| p.kind == PivotKind::Low);

        if let Some(high) = swing_high
            && close > high.price
        {
            let strength = ((close - high.price).abs() / close * 1000.0).round();
            return Some(BosSignal {
                kind: BosKind::Bullish,
                price: high.price,
                strength: strength.clamp(50.0, 100.0) as u8,
            });
        }
        if let Some(low) = swing_low
            && close < low.price
        {
            let strength = ((close - low.price).abs() / close * 1000.0).round();
            return Some(BosSignal {
                kind: BosKind::Bearish,
                price: low.price,
                strength: strength.clamp(50.0, 100.0) as u8,
            });
        }
        None
    }

    /// Change of character over the most recent pivots: a strictly
    /// falling low sequence answered by a higher high (bullish), mirror
    /// for bearish.
    fn detect_choch(&self, pivots: &[Pivot]) -> Option<ChochSignal> {
        let recent = &pivots[..pivots.len().min(self.config.choch_pivot_window)];

        // Newest-first within the window.
        let highs: Vec<&Pivot> = recent.iter().filter(|p| p.kind == PivotKind::High).collect();
        let lows: Vec<&Pivot> = recent.iter().filter(|p| p.kind == PivotKind::Low).collect();

        // Oldest-first price series for the run counters.
        let high_prices: Vec<f64> = highs.iter().rev().map(|p| p.price).collect();
        let low_prices: Vec<f64> = lows.iter().rev().map(|p| p.price).collect();
        let falling_lows = trailing_steps(&low_prices, |prev, next| next < prev);
        let rising_highs = trailing_steps(&high_prices, |prev, next| next > prev);

        // The answering pivot must be newer than the run it answers, so a
        // swing predating the run cannot flip the character.
        let higher_high = highs.len() >= 2
            && highs[0].price > highs[1].price
            && lows.first().is_some_and(|low| highs[0].index < low.index);
        let lower_low = lows.len() >= 2
            && lows[0].price < lows[1].price
            && highs.first().is_some_and(|high| lows[0].index < high.index);

        if falling_lows >= 2 && higher_high {
            return Some(ChochSignal {
                kind: ChochKind::Bullish,
                confidence: self.config.choch_confidence,
            });
        }
        if rising_highs >= 2 && lower_low {
            return Some(ChochSignal {
                kind: ChochKind::Bearish,
                confidence: self.config.choch_confidence,
            });
        }
        None
    }

    /// Liquidity sweep: within the last few candles, a wick through the
    /// nearest prior swing point that closed back inside.
    fn detect_sweep(&self, candles: &[Candle], pivots: &[Pivot]) -> Option<LiquiditySweep> {
        let lookback = self.config.sweep_lookback.min(candles.len());
        let prior_high = latest_pivot(pivots, PivotKind::High, lookback);
        let prior_low = latest_pivot(pivots, PivotKind::Low, lookback);

        for candle in &candles[..lookback] {
            if let Some(high) = prior_high
                && candle.high_f64() > high.price
                && candle.close_f64() < high.price
            {
                return Some(LiquiditySweep {
                    kind: SweepKind::High,
                    level: high.price,
                    rejected: true,
                });
            }
            if let Some(low) = prior_low
                && candle.low_f64() < low.price
                && candle.close_f64() > low.price
            {
                return Some(LiquiditySweep {
                    kind: SweepKind::Low,
                    level: low.price,
                    rejected: true,
                });
            }
        }
        None
    }

    /// Five-state trend from a weighted score: 50-candle drift, BOS,
    /// CHOCH and the direction of the recent pivot pairs.
    fn classify_trend(
        &self,
        candles: &[Candle],
        pivots: &[Pivot],
        bos: Option<BosSignal>,
        choch: Option<ChochSignal>,
    ) -> TrendState {
        let window = self.config.min_candles.min(candles.len());
        let oldest = candles[window - 1].close_f64();
        let newest = candles[0].close_f64();
        let change_pct = if oldest > 0.0 {
            (newest - oldest) / oldest * 100.0
        } else {
            0.0
        };

        let mut score = change_pct * 10.0;

        match bos.map(|b| b.kind) {
            Some(BosKind::Bullish) => score += 30.0,
            Some(BosKind::Bearish) => score -= 30.0,
            None => {}
        }
        match choch.map(|c| c.kind) {
            Some(ChochKind::Bullish) => score += 20.0,
            Some(ChochKind::Bearish) => score -= 20.0,
            None => {}
        }

        // Higher-high / higher-low contribution from the two most recent
        // pivots of each kind.
        let highs: Vec<f64> = pivots
            .iter()
            .filter(|p| p.kind == PivotKind::High)
            .take(2)
            .map(|p| p.price)
            .collect();
        let lows: Vec<f64> = pivots
            .iter()
            .filter(|p| p.kind == PivotKind::Low)
            .take(2)
            .map(|p| p.price)
            .collect();
        if highs.len() == 2 {
            if highs[0] > highs[1] {
                score += 10.0;
            } else if highs[0] < highs[1] {
                score -= 10.0;
            }
        }
        if lows.len() == 2 {
            if lows[0] > lows[1] {
                score += 10.0;
            } else if lows[0] < lows[1] {
                score -= 10.0;
            }
        }

        if score >= self.config.strong_trend_score {
            TrendState::StrongUptrend
        } else if score >= self.config.weak_trend_score {
            TrendState::WeakUptrend
        } else if score <= -self.config.strong_trend_score {
            TrendState::StrongDowntrend
        } else if score <= -self.config.weak_trend_score {
            TrendState::WeakDowntrend
        } else {
            TrendState::Range
        }
    }

    /// Stop hunt: a recent candle with a wick several times its body and
    /// a close on the opposite side of the wick.
    fn detect_stop_hunt(&self, candles: &[Candle]) -> bool {
        let ratio = self.config.stop_hunt_wick_ratio;
        candles
            .iter()
            .take(self.config.stop_hunt_lookback)
            .any(|c| {
                let body = c.body();
                (c.lower_wick() > ratio * body && c.lower_wick() > 0.0 && c.is_bullish())
                    || (c.upper_wick() > ratio * body && c.upper_wick() > 0.0 && c.is_bearish())
            })
    }

    fn micro_trend(&self, candles: &[Candle]) -> MicroTrend {
        let window = self.config.micro_trend_window.min(candles.len());
        if window < 2 {
            return MicroTrend::Neutral;
        }
        let oldest = candles[window - 1].close_f64();
        if oldest <= 0.0 {
            return MicroTrend::Neutral;
        }
        let change_pct = (candles[0].close_f64() - oldest) / oldest * 100.0;
        if change_pct > self.config.micro_trend_threshold_pct {
            MicroTrend::Bullish
        } else if change_pct < -self.config.micro_trend_threshold_pct {
            MicroTrend::Bearish
        } else {
            MicroTrend::Neutral
        }
    }
}

/// Longest run of consecutive steps satisfying `cmp`, counted from the
/// end of the sequence.
fn trailing_steps(values: &[f64], cmp: impl Fn(f64, f64) -> bool) -> usize {
    let mut steps = 0;
    for pair in values.windows(2).rev() {
        if cmp(pair[0], pair[1]) {
            steps += 1;
        } else {
            break;
        }
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn flat(price: f64) -> Candle {
        candle(price, price + 1.0, price - 1.0, price)
    }

    /// Newest-first series drifting upward by `step` per bar.
    fn uptrend(len: usize, start: f64, step: f64) -> Vec<Candle> {
        (0..len)
            .map(|i| {
                let p = start + (len - 1 - i) as f64 * step;
                candle(p - 0.5, p + 1.0, p - 1.0, p)
            })
            .collect()
    }

    #[test]
    fn test_faults_below_minimum() {
        let config = StructureConfig::default();
        let analyzer = MarketStructureAnalyzer::new(&config);
        let candles = vec![flat(100.0); 40];
        assert!(analyzer.analyze(&candles).is_err());
    }

    #[test]
    fn test_uptrend_classifies_bullish() {
        let config = StructureConfig::default();
        let analyzer = MarketStructureAnalyzer::new(&config);
        let candles = uptrend(60, 100.0, 1.0);
        let structure = analyzer.analyze(&candles).unwrap();
        assert!(structure.trend.is_bullish(), "got {:?}", structure.trend);
        assert_eq!(structure.micro_trend, MicroTrend::Bullish);
    }

    #[test]
    fn test_flat_series_is_range() {
        let config = StructureConfig::default();
        let analyzer = MarketStructureAnalyzer::new(&config);
        let candles = vec![flat(100.0); 60];
        let structure = analyzer.analyze(&candles).unwrap();
        assert_eq!(structure.trend, TrendState::Range);
        assert_eq!(structure.micro_trend, MicroTrend::Neutral);
        assert!(structure.bos.is_none());
    }

    #[test]
    fn test_bos_on_break_above_swing_high() {
        let config = StructureConfig::default();
        let analyzer = MarketStructureAnalyzer::new(&config);

        // Flat series with a swing high at index 10, latest close above it.
        let mut candles = vec![flat(100.0); 60];
        candles[10] = candle(100.0, 104.0, 99.0, 100.0);
        candles[0] = candle(104.0, 106.5, 104.0, 106.0);

        let structure = analyzer.analyze(&candles).unwrap();
        let bos = structure.bos.expect("expected bullish BOS");
        assert_eq!(bos.kind, BosKind::Bullish);
        assert_eq!(bos.price, 104.0);
        assert!(bos.strength >= 50 && bos.strength <= 100);
    }

    #[test]
    fn test_sweep_high_detected() {
        let config = StructureConfig::default();
        let analyzer = MarketStructureAnalyzer::new(&config);

        // Swing high at 105, latest candle pierces it but closes below.
        let mut candles = vec![flat(100.0); 60];
        candles[10] = candle(100.0, 105.0, 99.0, 100.0);
        candles[0] = candle(100.0, 106.0, 99.5, 100.5);

        let structure = analyzer.analyze(&candles).unwrap();
        let sweep = structure.sweep.expect("expected sweep of the high");
        assert_eq!(sweep.kind, SweepKind::High);
        assert_eq!(sweep.level, 105.0);
        assert!(sweep.rejected);
    }

    #[test]
    fn test_stop_hunt_long_lower_wick() {
        let config = StructureConfig::default();
        let analyzer = MarketStructureAnalyzer::new(&config);

        let mut candles = vec![flat(100.0); 60];
        // Body 0.5, lower wick 5.0, bullish close.
        candles[1] = candle(100.0, 100.6, 95.0, 100.5);

        let structure = analyzer.analyze(&candles).unwrap();
        assert!(structure.stop_hunt);
    }

    fn piv(kind: PivotKind, price: f64, index: usize) -> Pivot {
        Pivot {
            kind,
            price,
            index,
            time: 0,
        }
    }

    #[test]
    fn test_choch_ignores_higher_high_older_than_the_low_run() {
        let config = StructureConfig::default();
        let analyzer = MarketStructureAnalyzer::new(&config);

        // Falling lows answered only by swing highs that predate the run.
        let pivots = vec![
            piv(PivotKind::Low, 98.0, 5),
            piv(PivotKind::Low, 99.0, 15),
            piv(PivotKind::Low, 100.0, 25),
            piv(PivotKind::High, 110.0, 30),
            piv(PivotKind::High, 105.0, 40),
        ];
        assert!(analyzer.detect_choch(&pivots).is_none());
    }

    #[test]
    fn test_choch_bullish_on_fresh_higher_high() {
        let config = StructureConfig::default();
        let analyzer = MarketStructureAnalyzer::new(&config);

        // Same falling lows, but the higher high prints after them.
        let pivots = vec![
            piv(PivotKind::High, 103.0, 2),
            piv(PivotKind::Low, 98.0, 8),
            piv(PivotKind::Low, 99.0, 18),
            piv(PivotKind::Low, 100.0, 28),
            piv(PivotKind::High, 102.0, 34),
        ];
        let choch = analyzer
            .detect_choch(&pivots)
            .expect("expected a bullish change of character");
        assert_eq!(choch.kind, ChochKind::Bullish);
    }

    #[test]
    fn test_trailing_steps_counts_from_end() {
        assert_eq!(trailing_steps(&[5.0, 4.0, 3.0], |a, b| b < a), 2);
        assert_eq!(trailing_steps(&[3.0, 4.0, 2.0], |a, b| b < a), 1);
        assert_eq!(trailing_steps(&[1.0, 2.0], |a, b| b < a), 0);
    }
}
