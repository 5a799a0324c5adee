use thiserror::Error;

/// Top-level error type for the AutoImport assistant.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for AutoImportError` so that the `?` operator works
/// across crate boundaries in the binary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AutoImportError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Conversation error: {0}")]
    Conversation(String),

    #[error("Simulator error: {0}")]
    Simulator(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for AutoImportError {
    fn from(err: toml::de::Error) -> Self {
        AutoImportError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AutoImportError {
    fn from(err: toml::ser::Error) -> Self {
        AutoImportError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for AutoImportError {
    fn from(err: serde_json::Error) -> Self {
        AutoImportError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for AutoImport operations.
pub type Result<T> = std::result::Result<T, AutoImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AutoImportError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_error_display_all_variants() {
        let cases: Vec<(AutoImportError, &str)> = vec![
            (
                AutoImportError::Config("bad key".to_string()),
                "Configuration error: bad key",
            ),
            (
                AutoImportError::Backend("unreachable".to_string()),
                "Backend error: unreachable",
            ),
            (
                AutoImportError::Conversation("busy".to_string()),
                "Conversation error: busy",
            ),
            (
                AutoImportError::Simulator("unknown preset".to_string()),
                "Simulator error: unknown preset",
            ),
            (
                AutoImportError::Serialization("invalid json".to_string()),
                "Serialization error: invalid json",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AutoImportError = io_err.into();
        assert!(matches!(err, AutoImportError::Io(_)));
        assert!(err.to_string().starts_with("I/O error:"));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_from_toml_de() {
        let err: std::result::Result<toml::Value, _> = toml::from_str("invalid = [[[");
        let converted: AutoImportError = err.unwrap_err().into();
        assert!(matches!(converted, AutoImportError::Config(_)));
    }

    #[test]
    fn test_error_from_serde_json() {
        let err: std::result::Result<serde_json::Value, _> = serde_json::from_str("{ nope }");
        let converted: AutoImportError = err.unwrap_err().into();
        assert!(matches!(converted, AutoImportError::Serialization(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let value = io_result?;
            Ok(value.to_string())
        }

        assert_eq!(inner().unwrap(), "42");
    }
}
