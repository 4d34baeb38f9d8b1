use tracing::{debug, info};

use crate::application::builders::{ScalpBuilder, SwingBuilder};
use crate::application::classifiers::{RegimeClassifier, VolatilityAnalyzer, enforce_bias};
use crate::application::context::AnalysisContext;
use crate::application::liquidity::LiquidityEngine;
use crate::application::structure::MarketStructureAnalyzer;
use crate::application::zones::ZoneDetector;
use crate::config::AnalysisConfig;
use crate::domain::errors::AnalysisError;
use crate::domain::recommendation::Recommendations;

/// Runs the full pipeline over one snapshot of market data.
///
/// Stateless: every call takes the context and configuration explicitly
/// and identical inputs produce identical outputs. A pipeline fault
/// (typically insufficient history) degrades to a NoTrade pair carrying
/// the fault text, never an error to the caller.
pub struct MarketAnalyzer;

impl MarketAnalyzer {
    pub fn analyze(ctx: &AnalysisContext, config: &AnalysisConfig) -> Recommendations {
        match Self::run(ctx, config) {
            Ok(recs) => recs,
            Err(err) => {
                info!(symbol = %ctx.symbol, %err, "analysis degraded to no-trade");
                Recommendations::no_trade_pair(err.to_string())
            }
        }
    }

    fn run(ctx: &AnalysisContext, config: &AnalysisConfig) -> Result<Recommendations, AnalysisError> {
        let structure = MarketStructureAnalyzer::new(&config.structure).analyze(&ctx.candles)?;
        debug!(trend = %structure.trend, pivots = structure.pivots.len(), "structure stage done");

        let zones = ZoneDetector::new(&config.zones).detect(ctx)?;
        debug!(
            demand = zones.demand_zones.len(),
            supply = zones.supply_zones.len(),
            reaction = zones.reaction_zone.is_some(),
            "zone stage done"
        );

        let liquidity = LiquidityEngine::new(&config.liquidity).map(ctx)?;
        debug!(
            levels = liquidity.levels.len(),
            clusters = liquidity.stop_clusters.len(),
            "liquidity stage done"
        );

        let regime = RegimeClassifier::new(&config.regime).classify(ctx, &structure);
        let volatility = VolatilityAnalyzer::new(&config.volatility).analyze(ctx);
        let bias = enforce_bias(regime, &structure);

        let scalp = ScalpBuilder::new(config).build(
            ctx,
            &structure,
            &zones,
            &liquidity,
            regime,
            &volatility,
            &bias,
        );
        let swing =
            SwingBuilder::new(config).build(ctx, &structure, &liquidity, regime, &volatility, &bias);

        info!(
            symbol = %ctx.symbol,
            regime = %regime,
            scalp = %scalp.direction,
            swing = %swing.direction,
            "analysis complete"
        );
        Ok(Recommendations { scalp, swing })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{Candle, Direction};
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

    #[test]
    fn test_insufficient_history_degrades_to_no_trade_pair() {
        let candles = vec![candle(100.0, 101.0, 99.0, 100.5); 10];
        let ctx = AnalysisContext::new("TEST", candles, Decimal::from_f64(100.0).unwrap());
        let config = AnalysisConfig::default();

        let recs = MarketAnalyzer::analyze(&ctx, &config);
        assert_eq!(recs.scalp.direction, Direction::NoTrade);
        assert_eq!(recs.swing.direction, Direction::NoTrade);
        assert!(recs.scalp.reasoning[0].contains("Insufficient data"));
    }

    #[test]
    fn test_identical_inputs_identical_outputs() {
        let candles: Vec<Candle> = (0..150)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.37).sin() * 2.0;
                candle(base, base + 0.8, base - 0.8, base + 0.3)
            })
            .collect();
        let ctx = AnalysisContext::new("TEST", candles, Decimal::from_f64(100.0).unwrap());
        let config = AnalysisConfig::default();

        let first = MarketAnalyzer::analyze(&ctx, &config);
        let second = MarketAnalyzer::analyze(&ctx, &config);
        assert_eq!(first, second);
    }
}
