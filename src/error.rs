//! Error types for span reconstruction.

/// Result type alias for reconstruction operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Errors raised while rewriting a candidate span.
///
/// These never escape the public API: a reconstructor converts them into a
/// failed [`RepairResult`](crate::repair::RepairResult) carrying the message
/// as a diagnostic warning. Malformed *input* is not an error condition
/// anywhere in this crate.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The rewritten text failed strict JSON validation.
    #[error("repaired text failed validation: {0}")]
    Validation(#[from] serde_json::Error),

    /// No grammar rule could interpret the span in the attempted mode.
    #[error("unrecognized structure: {0}")]
    Unrecognized(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err: ParseError = json_err.into();
        assert!(matches!(err, ParseError::Validation(_)));
        assert!(err.to_string().contains("failed validation"));
    }

    #[test]
    fn test_unrecognized_display() {
        let err = ParseError::Unrecognized("no opener");
        assert_eq!(err.to_string(), "unrecognized structure: no opener");
    }
}
