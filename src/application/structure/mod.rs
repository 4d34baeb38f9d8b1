mod analyzer;
mod pivots;

pub use analyzer::MarketStructureAnalyzer;
pub use pivots::{detect_pivots, latest_pivot};
