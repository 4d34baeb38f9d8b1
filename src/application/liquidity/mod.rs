mod engine;

pub use engine::LiquidityEngine;
