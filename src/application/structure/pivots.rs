use crate::domain::errors::AnalysisError;
use crate::domain::market::structure::{Pivot, PivotKind};
use crate::domain::types::Candle;

/// Extract fractal swing highs and lows.
///
/// A candle at index `i` is a swing high when no candle within
/// `[i - w, i + w]` (excluding `i`) prints a higher high; the mirror rule
/// gives swing lows. With newest-first candles the returned pivots are
/// ordered most recent first.
pub fn detect_pivots(candles: &[Candle], lookaround: usize) -> Result<Vec<Pivot>, AnalysisError> {
    let needed = 2 * lookaround + 1;
    if candles.len() < needed {
        return Err(AnalysisError::InsufficientData {
            stage: "pivot detection",
            needed,
            got: candles.len(),
        });
    }

    let mut pivots = Vec::new();
    for i in lookaround..candles.len() - lookaround {
        let high = candles[i].high_f64();
        let low = candles[i].low_f64();

        let mut is_high = true;
        let mut is_low = true;
        for j in i - lookaround..=i + lookaround {
            if j == i {
                continue;
            }
            if candles[j].high_f64() > high {
                is_high = false;
            }
            if candles[j].low_f64() < low {
                is_low = false;
            }
            if !is_high && !is_low {
                break;
            }
        }

        if is_high {
            pivots.push(Pivot {
                kind: PivotKind::High,
                price: high,
                index: i,
                time: candles[i].timestamp,
            });
        }
        if is_low {
            pivots.push(Pivot {
                kind: PivotKind::Low,
                price: low,
                index: i,
                time: candles[i].timestamp,
            });
        }
    }

    Ok(pivots)
}

/// Most recent pivot of the given kind, optionally skipping pivots inside
/// the freshest `min_index` candles.
pub fn latest_pivot(pivots: &[Pivot], kind: PivotKind, min_index: usize) -> Option<&Pivot> {
    pivots
        .iter()
        .find(|p| p.kind == kind && p.index >= min_index)
}
