//! Error types for the joint analysis engine

use std::fmt;

/// Errors that can occur during joint audio-score analysis
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Invalid input parameters or configuration
    InvalidInput(String),

    /// Score events violate ordering or uniqueness invariants
    MalformedScore(String),

    /// Tonic/tempo estimation cannot proceed
    AlignmentPrerequisite(String),

    /// Audio-score alignment produced no acceptable solution
    AlignmentFailed(String),

    /// Not enough voiced, aligned pitch samples to model notes
    InsufficientEvidence(String),

    /// Cancelled by the caller or stopped at a deadline
    Cancelled(String),

    /// Numerical error (non-finite values, empty reductions, etc.)
    NumericalError(String),

    /// Conversion to or from plain data failed
    SerializationError(String),
}

impl AnalysisError {
    /// Whether the error must abort the whole run.
    ///
    /// Non-fatal errors only make the dependent joint features unavailable.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalysisError::InvalidInput(_)
                | AnalysisError::MalformedScore(_)
                | AnalysisError::SerializationError(_)
        )
    }
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalysisError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AnalysisError::MalformedScore(msg) => write!(f, "Malformed score: {}", msg),
            AnalysisError::AlignmentPrerequisite(msg) => {
                write!(f, "Alignment prerequisite not met: {}", msg)
            }
            AnalysisError::AlignmentFailed(msg) => write!(f, "Alignment failed: {}", msg),
            AnalysisError::InsufficientEvidence(msg) => {
                write!(f, "Insufficient evidence: {}", msg)
            }
            AnalysisError::Cancelled(msg) => write!(f, "Cancelled: {}", msg),
            AnalysisError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
            AnalysisError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for AnalysisError {}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AnalysisError::MalformedScore("dup".into()).is_fatal());
        assert!(AnalysisError::InvalidInput("x".into()).is_fatal());
        assert!(!AnalysisError::AlignmentFailed("x".into()).is_fatal());
        assert!(!AnalysisError::AlignmentPrerequisite("x".into()).is_fatal());
        assert!(!AnalysisError::InsufficientEvidence("x".into()).is_fatal());
        assert!(!AnalysisError::Cancelled("x".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        let err = AnalysisError::AlignmentFailed("cost too high".to_string());
        assert_eq!(err.to_string(), "Alignment failed: cost too high");
    }
}
