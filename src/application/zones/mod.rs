mod detector;
mod reaction;

pub use detector::ZoneDetector;
pub use reaction::at_reaction_zone;
