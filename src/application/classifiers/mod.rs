mod bias;
mod regime;
mod volatility;

pub use bias::enforce_bias;
pub use regime::RegimeClassifier;
pub use volatility::VolatilityAnalyzer;
