use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    #[error("Execution error: {0}")]
    ExecutionError(String),

    #[error("Stream error: {0}")]
    StreamError(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl QueryError {
    /// Errors scoped to a single row. The executor drops the row and keeps going.
    pub fn is_row_local(&self) -> bool {
        matches!(
            self,
            QueryError::TypeMismatch { .. } | QueryError::EvaluationError(_)
        )
    }
}

impl From<std::io::Error> for QueryError {
    fn from(err: std::io::Error) -> Self {
        QueryError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_local_classification() {
        assert!(QueryError::EvaluationError("x".into()).is_row_local());
        assert!(QueryError::TypeMismatch {
            expected: "number".into(),
            found: "abc".into()
        }
        .is_row_local());
        assert!(!QueryError::ParseError("x".into()).is_row_local());
        assert!(!QueryError::TableNotFound("t".into()).is_row_local());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: QueryError = io.into();
        assert_eq!(err.to_string(), "IO error: pipe closed");
    }
}
