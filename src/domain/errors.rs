use thiserror::Error;

/// Faults raised by the analysis pipeline.
///
/// Only hard faults live here. Degenerate arithmetic (zero ranges, zero
/// averages) is handled locally with neutral sentinels and never surfaces
/// as an error.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Insufficient data for {stage}: need {needed} candles, got {got}")]
    InsufficientData {
        stage: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("Degenerate input: {reason}")]
    DegenerateInput { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_data_formatting() {
        let err = AnalysisError::InsufficientData {
            stage: "market structure",
            needed: 50,
            got: 40,
        };
        let msg = err.to_string();
        assert!(msg.contains("market structure"));
        assert!(msg.contains("50"));
        assert!(msg.contains("40"));
    }
}
