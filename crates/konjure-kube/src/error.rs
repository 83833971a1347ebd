//! Error types for konjure-kube

use thiserror::Error;

use konjure_core::CoreError;

/// Result type for filter operations
pub type Result<T> = std::result::Result<T, FilterError>;

/// Errors raised while filtering a resource stream
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FilterError {
    /// An Application whose `spec.selector` cannot be decoded
    #[error("invalid selector on application '{application}': {message}")]
    InvalidApplicationSelector {
        application: String,
        message: String,
    },

    /// A resource-meta pattern that is not a valid regular expression
    #[error("invalid {field} pattern '{pattern}': {source}")]
    InvalidPattern {
        field: &'static str,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Unknown sort order name
    #[error("unknown sort order '{0}' (expected 'install' or 'uninstall')")]
    UnknownSortOrder(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for FilterError {
    fn from(e: serde_json::Error) -> Self {
        FilterError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for FilterError {
    fn from(e: serde_yaml::Error) -> Self {
        FilterError::Serialization(e.to_string())
    }
}
