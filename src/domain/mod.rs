pub mod errors;
pub mod market;
pub mod recommendation;
pub mod types;
