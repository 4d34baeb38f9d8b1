mod levels;
mod scalp;
mod swing;

pub use scalp::ScalpBuilder;
pub use swing::SwingBuilder;
