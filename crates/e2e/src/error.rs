//! Error types for the screenshot runner

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error(transparent)]
    Common(#[from] watchshot_common::Error),

    #[error("Failed to run `{command}`: {source}")]
    Process {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot empty output directory {path}: {reason}")]
    Cleanup { path: String, reason: String },

    #[error("Test case parse error: {0}")]
    SpecParse(String),

    #[error("Test case {name} failed:\n{message}")]
    CaseFailed { name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
