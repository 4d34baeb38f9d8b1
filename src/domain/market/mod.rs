pub mod liquidity;
pub mod regime;
pub mod structure;
pub mod zones;
