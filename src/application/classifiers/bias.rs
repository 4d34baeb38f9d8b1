use tracing::debug;

use crate::domain::market::regime::{ScalpBias, SwingBias, TrendBias};
use crate::domain::market::structure::{BosKind, MarketStructure, TrendState};

/// Per-horizon directional bias.
///
/// The swing bias is a hard gate: LongOnly/ShortOnly in trending
/// regimes, the most recent BOS direction in a range, NoTrade otherwise.
/// The scalp bias only shades confidence and never blocks a direction.
pub fn enforce_bias(regime: TrendState, structure: &MarketStructure) -> TrendBias {
    let swing = if regime.is_bullish() {
        SwingBias::LongOnly
    } else if regime.is_bearish() {
        SwingBias::ShortOnly
    } else {
        match structure.bos.map(|b| b.kind) {
            Some(BosKind::Bullish) => SwingBias::LongOnly,
            Some(BosKind::Bearish) => SwingBias::ShortOnly,
            None => SwingBias::NoTrade,
        }
    };

    let scalp = match regime {
        TrendState::StrongUptrend => ScalpBias::PreferLong,
        TrendState::StrongDowntrend => ScalpBias::PreferShort,
        _ => ScalpBias::Both,
    };

    let bias = TrendBias { swing, scalp };
    debug!(?bias.swing, ?bias.scalp, "trend bias enforced");
    bias
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::structure::{BosSignal, MicroTrend};

    fn structure_with_bos(bos: Option<BosSignal>) -> MarketStructure {
        MarketStructure {
            trend: TrendState::Range,
            bos,
            choch: None,
            sweep: None,
            stop_hunt: false,
            pivots: Vec::new(),
            micro_trend: MicroTrend::Neutral,
        }
    }

    #[test]
    fn test_strong_uptrend_is_long_only_prefer_long() {
        let bias = enforce_bias(TrendState::StrongUptrend, &structure_with_bos(None));
        assert_eq!(bias.swing, SwingBias::LongOnly);
        assert_eq!(bias.scalp, ScalpBias::PreferLong);
    }

    #[test]
    fn test_weak_downtrend_is_short_only_both() {
        let bias = enforce_bias(TrendState::WeakDowntrend, &structure_with_bos(None));
        assert_eq!(bias.swing, SwingBias::ShortOnly);
        assert_eq!(bias.scalp, ScalpBias::Both);
    }

    #[test]
    fn test_range_follows_recent_bos() {
        let bos = BosSignal {
            kind: BosKind::Bullish,
            price: 100.0,
            strength: 60,
        };
        let bias = enforce_bias(TrendState::Range, &structure_with_bos(Some(bos)));
        assert_eq!(bias.swing, SwingBias::LongOnly);
        assert_eq!(bias.scalp, ScalpBias::Both);
    }

    #[test]
    fn test_pure_range_blocks_swing_only() {
        let bias = enforce_bias(TrendState::Range, &structure_with_bos(None));
        assert_eq!(bias.swing, SwingBias::NoTrade);
        assert_eq!(bias.scalp, ScalpBias::Both);
    }
}
