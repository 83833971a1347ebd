//! Engine error types

use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

use konjure_core::CoreError;

/// Main engine error type
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ============ Parse Errors ============
    #[error("Malformed spec '{spec}': {message}")]
    #[diagnostic(code(konjure::spec::malformed))]
    MalformedSpec { spec: String, message: String },

    #[error("Unknown scheme '{scheme}' in '{spec}'")]
    #[diagnostic(
        code(konjure::spec::unknown_scheme),
        help("supported scheme overrides are 'git::' and 'helm::'")
    )]
    UnknownScheme { scheme: String, spec: String },

    #[error("Unable to determine the Helm chart from '{spec}'")]
    #[diagnostic(
        code(konjure::spec::helm_chart),
        help("link to a chart archive (.tgz) or add '?chart=<name>' to the repository URL")
    )]
    UnresolvableHelmChart { spec: String },

    #[error("Invalid Jsonnet output: {message}")]
    #[diagnostic(code(konjure::jsonnet::output))]
    InvalidJsonnetOutput { message: String },

    // ============ Reader Errors ============
    #[error("{tool} failed{}: {stderr}", code.map(|c| format!(" with exit code {}", c)).unwrap_or_default())]
    #[diagnostic(code(konjure::exec::failed))]
    ExternalCommandFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} executable not found: {program}")]
    #[diagnostic(
        code(konjure::exec::not_found),
        help("install {tool} or point Konjure at it with the matching --{tool} flag")
    )]
    ToolNotFound { tool: String, program: String },

    #[error("HTTP {status} from {url}")]
    #[diagnostic(code(konjure::http::status))]
    HttpStatus { url: String, status: u16 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("File not found: {path}")]
    #[diagnostic(code(konjure::file::not_found))]
    FileNotFound { path: String },

    /// A reader failed while expanding a spec node
    #[error("Failed to read {spec}")]
    Read {
        spec: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// The innermost error, unwrapping reader context
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::Read { source, .. } => source.root(),
            other => other,
        }
    }

    /// Is this a parse or model error (as opposed to a reader failure)?
    pub fn is_spec_error(&self) -> bool {
        matches!(
            self.root(),
            EngineError::MalformedSpec { .. }
                | EngineError::UnknownScheme { .. }
                | EngineError::UnresolvableHelmChart { .. }
                | EngineError::InvalidJsonnetOutput { .. }
                | EngineError::Core(
                    CoreError::MalformedSpec { .. }
                        | CoreError::UnknownKind { .. }
                        | CoreError::InvalidSelector { .. }
                )
        )
    }

    /// Did an external tool or remote endpoint fail?
    pub fn is_reader_error(&self) -> bool {
        matches!(
            self.root(),
            EngineError::ExternalCommandFailed { .. }
                | EngineError::ToolNotFound { .. }
                | EngineError::HttpStatus { .. }
                | EngineError::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failures collected while releasing reader resources
///
/// Cleanup never fails an expansion; these are only logged.
#[derive(Debug, Default)]
pub struct CleanupErrors(pub Vec<EngineError>);

impl CleanupErrors {
    pub fn push(&mut self, err: EngineError) {
        self.0.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for CleanupErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{} cleanup error(s): {}", self.0.len(), messages.join("; "))
    }
}

impl std::error::Error for CleanupErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_external_command_message() {
        let err = EngineError::ExternalCommandFailed {
            tool: "helm".into(),
            code: Some(1),
            stderr: "chart not found".into(),
        };
        assert_eq!(err.to_string(), "helm failed with exit code 1: chart not found");
        assert!(err.is_reader_error());
        assert!(!err.is_spec_error());
    }

    #[test]
    fn test_root_unwraps_read_context() {
        let err = EngineError::Read {
            spec: "Helm/nginx".into(),
            source: Box::new(EngineError::UnresolvableHelmChart { spec: "x".into() }),
        };
        assert!(err.is_spec_error());
        assert!(matches!(err.root(), EngineError::UnresolvableHelmChart { .. }));
    }

    #[test]
    fn test_cleanup_errors_display() {
        let mut errors = CleanupErrors::default();
        errors.push(EngineError::FileNotFound { path: "/tmp/a".into() });
        errors.push(EngineError::FileNotFound { path: "/tmp/b".into() });
        assert_eq!(
            errors.to_string(),
            "2 cleanup error(s): File not found: /tmp/a; File not found: /tmp/b"
        );
    }
}
