use serde::{Deserialize, Serialize};

use super::types::Direction;

/// Final output for one horizon.
///
/// `NoTrade` recommendations carry no numeric price fields; every `Buy`
/// satisfies `stop_loss < entry < take_profit` and every `Sell` the
/// mirror ordering. The downstream validator re-checks this, the engine
/// must already respect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecommendation {
    pub direction: Direction,
    pub entry: Option<f64>,
    /// Lower bound of the entry zone (scalp only).
    pub entry_min: Option<f64>,
    /// Upper bound of the entry zone (scalp only).
    pub entry_max: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub confidence: u8,
    pub reasoning: Vec<String>,
    pub structure_note: String,
    pub liquidity_note: String,
    pub momentum_note: String,
    pub volatility_note: String,
}

impl TradeRecommendation {
    /// A structurally valid no-trade result with the given reason.
    pub fn no_trade(reason: impl Into<String>) -> Self {
        Self {
            direction: Direction::NoTrade,
            entry: None,
            entry_min: None,
            entry_max: None,
            stop_loss: None,
            take_profit: None,
            confidence: 0,
            reasoning: vec![reason.into()],
            structure_note: String::new(),
            liquidity_note: String::new(),
            momentum_note: String::new(),
            volatility_note: String::new(),
        }
    }

    pub fn is_trade(&self) -> bool {
        self.direction != Direction::NoTrade
    }
}

/// The two-key result every `analyze` call returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendations {
    #[serde(rename = "SCALP")]
    pub scalp: TradeRecommendation,
    #[serde(rename = "SWING")]
    pub swing: TradeRecommendation,
}

impl Recommendations {
    /// Both horizons declined, typically because the pipeline faulted.
    pub fn no_trade_pair(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            scalp: TradeRecommendation::no_trade(reason.clone()),
            swing: TradeRecommendation::no_trade(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_trade_has_no_price_fields() {
        let rec = TradeRecommendation::no_trade("insufficient data");
        assert_eq!(rec.direction, Direction::NoTrade);
        assert!(rec.entry.is_none());
        assert!(rec.stop_loss.is_none());
        assert!(rec.take_profit.is_none());
        assert_eq!(rec.confidence, 0);
        assert_eq!(rec.reasoning, vec!["insufficient data".to_string()]);
    }

    #[test]
    fn test_recommendations_serialize_with_horizon_keys() {
        let recs = Recommendations::no_trade_pair("fault");
        let json = serde_json::to_value(&recs).unwrap();
        assert!(json.get("SCALP").is_some());
        assert!(json.get("SWING").is_some());
    }
}
