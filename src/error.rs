use thiserror::Error;

#[derive(Error, Debug)]
pub enum JoinError {
    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("Incompatible schemas: {0}")]
    IncompatibleSchemas(String),

    #[error("Memory limit exceeded: {0}")]
    MemoryLimitExceeded(String),

    #[error("Analysis timed out: {0}")]
    Timeout(String),

    #[error("Circular dependency: {0}")]
    CircularDependency(String),

    #[error("No join candidates found: {0}")]
    NoJoinCandidates(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl JoinError {
    /// Machine-readable failure code, stable across message wording changes.
    pub fn code(&self) -> &'static str {
        match self {
            JoinError::InvalidTable(_) => "INVALID_TABLE",
            JoinError::IncompatibleSchemas(_) => "INCOMPATIBLE_SCHEMAS",
            JoinError::MemoryLimitExceeded(_) => "MEMORY_LIMIT_EXCEEDED",
            JoinError::Timeout(_) => "TIMEOUT",
            JoinError::CircularDependency(_) => "CIRCULAR_DEPENDENCY",
            JoinError::NoJoinCandidates(_) => "NO_JOIN_CANDIDATES",
            // Unexpected internal failures surface as invalid input to callers.
            JoinError::Io(_) | JoinError::Json(_) | JoinError::Csv(_) => "INVALID_TABLE",
        }
    }
}

pub type Result<T> = std::result::Result<T, JoinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(JoinError::InvalidTable("x".into()).code(), "INVALID_TABLE");
        assert_eq!(JoinError::Timeout("x".into()).code(), "TIMEOUT");
        assert_eq!(
            JoinError::NoJoinCandidates("x".into()).code(),
            "NO_JOIN_CANDIDATES"
        );
    }
}
