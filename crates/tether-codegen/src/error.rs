// ABOUTME: Error types for the tether-codegen crate.
// ABOUTME: Provides ExtractError, RenderError and the GenerateError that wraps a whole run.

use std::path::PathBuf;

use thiserror::Error;

/// Structural anomalies found while extracting services from a definition file.
///
/// Every variant carries the 1-based line the anomaly was found on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("line {line}: comment is never closed")]
    UnterminatedComment { line: usize },

    #[error("line {line}: string literal is never closed")]
    UnterminatedString { line: usize },

    #[error("line {line}: service name is empty")]
    EmptyServiceName { line: usize },

    #[error("line {line}: expected `{{` after service {service}")]
    MissingServiceBrace { line: usize, service: String },

    #[error("line {line}: service {service} has no matching closing brace")]
    UnclosedService { line: usize, service: String },

    #[error("line {line}: unmatched closing brace")]
    UnmatchedBrace { line: usize },

    #[error("line {line}: rpc declaration has an empty name")]
    EmptyMethodName { line: usize },

    #[error("line {line}: rpc {method} needs a request and a response type in parentheses")]
    MissingTypes { line: usize, method: String },

    #[error("line {line}: rpc {method} has an empty {which} type")]
    EmptyType {
        line: usize,
        method: String,
        which: &'static str,
    },

    #[error("line {line}: service {service} is declared twice")]
    DuplicateService { line: usize, service: String },

    #[error("line {line}: method {method} is declared twice in service {service}")]
    DuplicateMethod {
        line: usize,
        service: String,
        method: String,
    },
}

impl ExtractError {
    /// Line the anomaly was found on.
    pub fn line(&self) -> usize {
        match self {
            ExtractError::UnterminatedComment { line }
            | ExtractError::UnterminatedString { line }
            | ExtractError::EmptyServiceName { line }
            | ExtractError::MissingServiceBrace { line, .. }
            | ExtractError::UnclosedService { line, .. }
            | ExtractError::UnmatchedBrace { line }
            | ExtractError::EmptyMethodName { line }
            | ExtractError::MissingTypes { line, .. }
            | ExtractError::EmptyType { line, .. }
            | ExtractError::DuplicateService { line, .. }
            | ExtractError::DuplicateMethod { line, .. } => *line,
        }
    }
}

/// A field needed during substitution was missing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("method {method}: missing {field}")]
    MissingMethodField {
        method: String,
        field: &'static str,
    },
}

/// Errors that abort a generation run.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("rendering {service} failed: {source}")]
    Render {
        service: String,
        #[source]
        source: RenderError,
    },

    #[error("protocol compiler failed: {0}")]
    Compiler(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}
