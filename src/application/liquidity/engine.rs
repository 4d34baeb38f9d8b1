use tracing::debug;

use crate::application::context::{AnalysisContext, PriceScale};
use crate::application::structure::detect_pivots;
use crate::config::LiquidityConfig;
use crate::domain::errors::AnalysisError;
use crate::domain::market::liquidity::{
    BreakerBlock, LiquidityLevel, LiquidityMap, LiquiditySide, LiquidityTarget, OrderBlock,
    StopCluster, SweepZone, VolumePocket,
};
use crate::domain::market::structure::PivotKind;
use crate::domain::types::Candle;

/// Volume pockets are searched within this many recent candles.
const POCKET_LOOKBACK: usize = 100;

/// Liquidity stage: swing levels, equal-price stop clusters, sweep zones,
/// breaker blocks, order blocks, volume pockets and the nearest
/// liquidity-based price target.
pub struct LiquidityEngine<'a> {
    config: &'a LiquidityConfig,
}

impl<'a> LiquidityEngine<'a> {
    pub fn new(config: &'a LiquidityConfig) -> Self {
        Self { config }
    }

    pub fn map(&self, ctx: &AnalysisContext) -> Result<LiquidityMap, AnalysisError> {
        if ctx.candles.len() < self.config.min_candles {
            return Err(AnalysisError::InsufficientData {
                stage: "liquidity mapping",
                needed: self.config.min_candles,
                got: ctx.candles.len(),
            });
        }

        let scale = ctx.scale();
        let proximity_pct = scale.usd_as_pct(self.config.level_proximity_usd);

        let levels = self.detect_levels(&ctx.candles, &scale, proximity_pct)?;
        let stop_clusters = self.detect_stop_clusters(&ctx.candles, &scale, proximity_pct);
        let sweep_zones = self.detect_sweep_zones(&ctx.candles);
        let breaker_blocks = self.detect_breaker_blocks(&ctx.candles, &levels);
        let order_blocks = self.detect_order_blocks(&ctx.candles);
        let volume_pockets = self.detect_volume_pockets(&ctx.candles);
        let target = resolve_target(ctx.price_f64, &levels, &stop_clusters);

        debug!(
            levels = levels.len(),
            clusters = stop_clusters.len(),
            order_blocks = order_blocks.len(),
            above = ?target.above,
            below = ?target.below,
            "liquidity map resolved"
        );

        Ok(LiquidityMap {
            levels,
            stop_clusters,
            sweep_zones,
            breaker_blocks,
            order_blocks,
            volume_pockets,
            target,
        })
    }

    /// Five-candle fractal levels scored by how many other candles
    /// printed an extreme inside the proximity band.
    fn detect_levels(
        &self,
        candles: &[Candle],
        scale: &PriceScale,
        proximity_pct: f64,
    ) -> Result<Vec<LiquidityLevel>, AnalysisError> {
        let pivots = detect_pivots(candles, self.config.fractal_lookaround)?;

        let mut levels: Vec<LiquidityLevel> = pivots
            .iter()
            .map(|pivot| {
                let touches = candles
                    .iter()
                    .enumerate()
                    .filter(|(i, c)| {
                        *i != pivot.index
                            && match pivot.kind {
                                PivotKind::High => {
                                    scale.distance_pct(c.high_f64(), pivot.price) <= proximity_pct
                                }
                                PivotKind::Low => {
                                    scale.distance_pct(c.low_f64(), pivot.price) <= proximity_pct
                                }
                            }
                    })
                    .count() as u32;
                LiquidityLevel {
                    price: pivot.price,
                    side: match pivot.kind {
                        PivotKind::High => LiquiditySide::High,
                        PivotKind::Low => LiquiditySide::Low,
                    },
                    touches,
                    strength: (touches as f64 * self.config.touch_strength).min(100.0),
                    index: pivot.index,
                }
            })
            .collect();

        levels.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        levels.truncate(self.config.max_levels);
        Ok(levels)
    }

    /// Equal-price extremes within the adjacent candle window imply a
    /// pool of resting stops.
    fn detect_stop_clusters(
        &self,
        candles: &[Candle],
        scale: &PriceScale,
        proximity_pct: f64,
    ) -> Vec<StopCluster> {
        let mut clusters: Vec<StopCluster> = Vec::new();

        for i in 0..candles.len() {
            let window_end = (i + 1 + self.config.cluster_window).min(candles.len());
            let neighbors = &candles[i + 1..window_end];

            let high = candles[i].high_f64();
            let high_matches = neighbors
                .iter()
                .filter(|c| scale.distance_pct(c.high_f64(), high) <= proximity_pct)
                .count() as u32;
            if high_matches >= self.config.cluster_min_matches {
                push_cluster(
                    &mut clusters,
                    scale,
                    proximity_pct,
                    StopCluster {
                        price: high,
                        side: LiquiditySide::High,
                        count: high_matches,
                        strength: ((high_matches + 1) as f64 * self.config.cluster_strength_step)
                            .min(100.0),
                    },
                );
            }

            let low = candles[i].low_f64();
            let low_matches = neighbors
                .iter()
                .filter(|c| scale.distance_pct(c.low_f64(), low) <= proximity_pct)
                .count() as u32;
            if low_matches >= self.config.cluster_min_matches {
                push_cluster(
                    &mut clusters,
                    scale,
                    proximity_pct,
                    StopCluster {
                        price: low,
                        side: LiquiditySide::Low,
                        count: low_matches,
                        strength: ((low_matches + 1) as f64 * self.config.cluster_strength_step)
                            .min(100.0),
                    },
                );
            }
        }

        clusters.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        clusters.truncate(self.config.max_clusters);
        clusters
    }

    /// A dominant wick with an opposite close whose extreme then held.
    fn detect_sweep_zones(&self, candles: &[Candle]) -> Vec<SweepZone> {
        let ratio = self.config.sweep_wick_ratio;
        let mut sweeps = Vec::new();

        for i in 1..candles.len() {
            if sweeps.len() >= self.config.max_sweeps {
                break;
            }
            let c = &candles[i];
            let body = c.body();
            if body <= 0.0 {
                continue;
            }

            let respect_start = i.saturating_sub(self.config.sweep_respect_window);
            let newer = &candles[respect_start..i];

            if c.lower_wick() > ratio * body && c.is_bullish() {
                let level = c.low_f64();
                if newer.iter().all(|n| n.close_f64() >= level) {
                    sweeps.push(SweepZone {
                        level,
                        side: LiquiditySide::Low,
                        strength: self.config.sweep_strength,
                    });
                }
            } else if c.upper_wick() > ratio * body && c.is_bearish() {
                let level = c.high_f64();
                if newer.iter().all(|n| n.close_f64() <= level) {
                    sweeps.push(SweepZone {
                        level,
                        side: LiquiditySide::High,
                        strength: self.config.sweep_strength,
                    });
                }
            }
        }
        sweeps
    }

    /// A level that served as support/resistance at least twice and was
    /// later closed through now acts as the opposite role.
    fn detect_breaker_blocks(
        &self,
        candles: &[Candle],
        levels: &[LiquidityLevel],
    ) -> Vec<BreakerBlock> {
        let mut breakers = Vec::new();
        for level in levels {
            if breakers.len() >= self.config.max_breakers {
                break;
            }
            if level.touches < self.config.breaker_min_touches {
                continue;
            }

            // Only candles newer than the forming pivot can break it.
            let newer = &candles[..level.index.min(candles.len())];
            let broken = newer.iter().any(|c| match level.side {
                LiquiditySide::Low => c.close_f64() < level.price,
                LiquiditySide::High => c.close_f64() > level.price,
            });
            if broken {
                breakers.push(BreakerBlock {
                    price: level.price,
                    side: level.side,
                    touches: level.touches,
                    strength: self.config.breaker_strength,
                });
            }
        }
        breakers
    }

    /// The last opposite-colored candle before a directional move.
    fn detect_order_blocks(&self, candles: &[Candle]) -> Vec<OrderBlock> {
        let mut blocks: Vec<OrderBlock> = Vec::new();

        for i in 1..candles.len() {
            let c = &candles[i];
            let close = c.close_f64();
            if close <= 0.0 {
                continue;
            }
            let window_start = i.saturating_sub(self.config.order_block_window);
            let newer = &candles[window_start..i];

            // Bullish OB: bearish base, immediately answered by buying.
            if c.is_bearish() && candles[i - 1].is_bullish() {
                let peak = newer
                    .iter()
                    .map(|n| n.high_f64())
                    .fold(f64::MIN, f64::max);
                let move_pct = (peak - close) / close * 100.0;
                if move_pct >= self.config.order_block_move_pct {
                    blocks.push(OrderBlock {
                        high: c.high_f64(),
                        low: c.low_f64(),
                        bullish: true,
                        move_pct,
                        strength: (move_pct * 10.0).round().min(100.0),
                    });
                }
            } else if c.is_bullish() && candles[i - 1].is_bearish() {
                let trough = newer.iter().map(|n| n.low_f64()).fold(f64::MAX, f64::min);
                let move_pct = (close - trough) / close * 100.0;
                if move_pct >= self.config.order_block_move_pct {
                    blocks.push(OrderBlock {
                        high: c.high_f64(),
                        low: c.low_f64(),
                        bullish: false,
                        move_pct,
                        strength: (move_pct * 10.0).round().min(100.0),
                    });
                }
            }
        }

        blocks.sort_by(|a, b| b.strength.total_cmp(&a.strength));
        blocks.truncate(self.config.max_order_blocks);
        blocks
    }

    /// Runs of thin-volume candles.
    fn detect_volume_pockets(&self, candles: &[Candle]) -> Vec<VolumePocket> {
        let lookback = POCKET_LOOKBACK.min(candles.len());
        let scan = &candles[..lookback];
        let avg = if scan.is_empty() {
            0.0
        } else {
            scan.iter().map(|c| c.volume).sum::<f64>() / scan.len() as f64
        };
        if avg <= 0.0 {
            return Vec::new();
        }
        let threshold = avg * self.config.pocket_volume_ratio;

        let mut pockets = Vec::new();
        let mut run_start: Option<usize> = None;
        for (i, c) in scan.iter().enumerate() {
            if c.volume < threshold {
                run_start.get_or_insert(i);
                continue;
            }
            if let Some(start) = run_start.take() {
                self.close_pocket(&mut pockets, &scan[start..i]);
            }
        }
        if let Some(start) = run_start {
            self.close_pocket(&mut pockets, &scan[start..]);
        }

        pockets.truncate(self.config.max_pockets);
        pockets
    }

    fn close_pocket(&self, pockets: &mut Vec<VolumePocket>, run: &[Candle]) {
        if run.len() < self.config.pocket_min_span {
            return;
        }
        let high = run.iter().map(|c| c.high_f64()).fold(f64::MIN, f64::max);
        let low = run.iter().map(|c| c.low_f64()).fold(f64::MAX, f64::min);
        pockets.push(VolumePocket {
            high,
            low,
            span: run.len(),
            strength: (40.0 + run.len() as f64 * 5.0).min(100.0),
        });
    }
}

fn push_cluster(
    clusters: &mut Vec<StopCluster>,
    scale: &PriceScale,
    proximity_pct: f64,
    cluster: StopCluster,
) {
    // Clusters at effectively the same price on the same side collapse
    // onto the first (most recent) occurrence.
    if clusters
        .iter()
        .any(|c| c.side == cluster.side && scale.distance_pct(c.price, cluster.price) <= proximity_pct)
    {
        return;
    }
    clusters.push(cluster);
}

/// Nearest liquidity-backed price above and below current price.
fn resolve_target(
    price: f64,
    levels: &[LiquidityLevel],
    clusters: &[StopCluster],
) -> LiquidityTarget {
    let mut target = LiquidityTarget::default();
    let prices = levels
        .iter()
        .map(|l| l.price)
        .chain(clusters.iter().map(|c| c.price));

    for p in prices {
        if p > price {
            target.above = Some(match target.above {
                Some(existing) => existing.min(p),
                None => p,
            });
        } else if p < price {
            target.below = Some(match target.below {
                Some(existing) => existing.max(p),
                None => p,
            });
        }
    }
    target
}
