//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed spec '{spec}': {message}")]
    MalformedSpec { spec: String, message: String },

    #[error("Unknown Konjure kind '{kind}'{}", suggestion.as_ref().map(|s| format!(" (did you mean '{}'?)", s)).unwrap_or_default())]
    UnknownKind {
        kind: String,
        suggestion: Option<String>,
    },

    #[error("Invalid label selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("Values merge error: {message}")]
    ValuesMerge { message: String },

    #[error("Invalid merge schema: {message}")]
    InvalidSchema { message: String },

    #[error("Cannot generate password for '{key}': {message}")]
    PasswordRecipe { key: String, message: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
