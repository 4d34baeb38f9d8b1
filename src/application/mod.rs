pub mod analyzer;
pub mod builders;
pub mod classifiers;
pub mod context;
pub mod liquidity;
pub mod structure;
pub mod zones;
