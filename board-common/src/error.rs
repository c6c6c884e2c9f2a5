//! Error types for the market board tools.

use thiserror::Error;

/// Result type alias using the board error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the board crates.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required series or file had no usable rows
    #[error("No data: {0}")]
    NoData(String),

    /// Template registration or rendering failed
    #[error("Template error: {0}")]
    Template(String),

    /// Chart drawing failed
    #[error("Chart error: {0}")]
    Chart(String),

    /// Email assembly or delivery failed
    #[error("Email error: {0}")]
    Email(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an error with additional context.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this error means "nothing to work with" rather than a fault.
    pub fn is_no_data(&self) -> bool {
        match self {
            Self::NoData(_) => true,
            Self::WithContext { source, .. } => source.is_no_data(),
            _ => false,
        }
    }
}

/// Extension trait for adding context to any error type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = Error::NoData("etf history".into());
        let with_ctx = err.with_context("loading advisor input");
        assert!(matches!(with_ctx, Error::WithContext { .. }));
        assert!(with_ctx.is_no_data());
        assert_eq!(
            with_ctx.to_string(),
            "loading advisor input: No data: etf history"
        );
    }

    #[test]
    fn test_result_ext_wraps_io() {
        let res: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing",
        ));
        let err = res.context("reading price.json").unwrap_err();
        assert!(err.to_string().starts_with("reading price.json"));
        assert!(!err.is_no_data());
    }
}
