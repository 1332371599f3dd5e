use thiserror::Error;

/// Custom error types for the quiz room server
#[derive(Debug, Error)]
pub enum QuizError {
    /// Roster errors
    #[error("Player {0} not found")]
    PlayerNotFound(String),

    #[error("Player {0} not authorized for this operation")]
    Unauthorized(String),

    /// Phase machine errors
    #[error("Action {action} rejected in phase {phase}")]
    InvalidPhase { action: &'static str, phase: String },

    #[error("Question index {0} out of range")]
    QuestionOutOfRange(usize),

    /// Protocol errors
    #[error("Failed to serialize message: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Convenience type alias for Results using QuizError
pub type Result<T> = std::result::Result<T, QuizError>;

impl QuizError {
    /// Helper to create phase errors with context
    pub fn invalid_phase(action: &'static str, phase: impl std::fmt::Debug) -> Self {
        QuizError::InvalidPhase {
            action,
            phase: format!("{:?}", phase),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = QuizError::Unauthorized("p-123".to_string());
        assert_eq!(
            err.to_string(),
            "Player p-123 not authorized for this operation"
        );
    }

    #[test]
    fn test_invalid_phase_helper() {
        let err = QuizError::invalid_phase("startGame", "Instructions");
        assert!(matches!(err, QuizError::InvalidPhase { .. }));
        assert!(err.to_string().contains("startGame"));
    }
}
