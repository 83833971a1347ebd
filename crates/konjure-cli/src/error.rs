//! CLI error types with exit code handling
//!
//! Library errors are folded into a single CLI error that knows its exit code.

use miette::Diagnostic;
use thiserror::Error;

use konjure_core::CoreError;
use konjure_engine::EngineError;
use konjure_kube::FilterError;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// A spec or Konjure resource could not be understood
    #[error("{message}")]
    #[diagnostic(code(konjure::cli::spec))]
    Spec {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// An external tool or remote endpoint failed
    #[error("{message}")]
    #[diagnostic(code(konjure::cli::reader))]
    Reader {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(konjure::cli::io))]
    Io { message: String },

    /// Invalid flag values
    #[error("{message}")]
    #[diagnostic(code(konjure::cli::usage))]
    Usage { message: String },

    /// Output could not be produced
    #[error("Output error: {message}")]
    #[diagnostic(code(konjure::cli::output))]
    Output { message: String },

    /// Wrapped error for passthrough (stores the formatted message)
    #[error("{message}")]
    #[diagnostic(code(konjure::cli::error))]
    Other { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Spec { .. } => exit_codes::SPEC_ERROR,
            CliError::Reader { .. } => exit_codes::READER_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Usage { .. } => exit_codes::USAGE_ERROR,
            CliError::Output { .. } => exit_codes::ERROR,
            CliError::Other { .. } => exit_codes::ERROR,
        }
    }

    /// Create a usage error
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }
}

/// Render an error and its sources as `outer: inner: root`
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}

fn engine_help(err: &EngineError) -> Option<String> {
    match err.root() {
        EngineError::ToolNotFound { tool, .. } => Some(format!(
            "install {tool} or point Konjure at it with the matching --{tool} flag"
        )),
        EngineError::UnknownScheme { .. } => {
            Some("supported scheme overrides are 'git::' and 'helm::'".to_string())
        }
        EngineError::UnresolvableHelmChart { .. } => {
            Some("link to a chart archive (.tgz) or add '?chart=<name>' to the repository URL".to_string())
        }
        _ => None,
    }
}

impl From<EngineError> for CliError {
    fn from(err: EngineError) -> Self {
        let message = error_chain(&err);
        if err.is_spec_error() {
            return CliError::Spec {
                help: engine_help(&err),
                message,
            };
        }
        if err.is_reader_error() {
            return CliError::Reader {
                help: engine_help(&err),
                message,
            };
        }
        match err.root() {
            EngineError::Io(_) | EngineError::FileNotFound { .. } => CliError::Io { message },
            EngineError::Core(CoreError::Io(_)) => CliError::Io { message },
            _ => CliError::Other { message },
        }
    }
}

impl From<FilterError> for CliError {
    fn from(err: FilterError) -> Self {
        let message = error_chain(&err);
        match err {
            FilterError::InvalidApplicationSelector { .. } => CliError::Spec {
                message,
                help: None,
            },
            FilterError::InvalidPattern { .. }
            | FilterError::UnknownSortOrder(_)
            | FilterError::Core(CoreError::InvalidSelector { .. }) => CliError::Usage { message },
            _ => CliError::Other { message },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = error_chain(&err);
        match err {
            CoreError::Io(_) => CliError::Io { message },
            CoreError::InvalidSelector { .. } => CliError::Usage { message },
            CoreError::ValuesMerge { .. } | CoreError::YamlParse(_) | CoreError::JsonParse(_) => {
                CliError::Spec {
                    message,
                    help: None,
                }
            }
            _ => CliError::Other { message },
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
