//! Error types for the configuration manager.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse classification of a [`ManagerError`], used for API status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    Conflict,
    NotFound,
    StorageError,
    ExecutionFailed,
    ValidationFailed,
}

impl ErrorKind {
    /// Stable identifier used in error payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::StorageError => "storage_error",
            Self::ExecutionFailed => "execution_failed",
            Self::ValidationFailed => "validation_failed",
        }
    }
}

/// Step of the deployment sequence that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployStep {
    Backup,
    Promote,
    Reload,
}

impl std::fmt::Display for DeployStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backup => write!(f, "backup"),
            Self::Promote => write!(f, "promote"),
            Self::Reload => write!(f, "reload"),
        }
    }
}

/// Errors raised by the assembly, validation and deployment pipeline.
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Invalid input for '{field}': {message}")]
    InvalidInput {
        field: String,
        message: String,
        suggestion: Option<String>,
    },

    #[error("Section with checksum {checksum} already exists")]
    Conflict { checksum: String },

    #[error("Not found: {what}")]
    NotFound { what: String },

    #[error("Storage error on '{path}': {message}")]
    Storage {
        path: PathBuf,
        code: Option<i32>,
        message: String,
    },

    #[error("Failed to execute '{command}': {message}")]
    ExecutionFailed {
        command: String,
        code: Option<i32>,
        message: String,
    },

    #[error("Command '{command}' failed with exit code {return_code}")]
    ValidationFailed {
        command: String,
        return_code: i32,
        diagnostics: Vec<String>,
    },

    #[error("Deployment failed at {step} step: {source}")]
    Deploy {
        step: DeployStep,
        #[source]
        source: Box<ManagerError>,
    },

    #[error("Section store error: {0}")]
    Store(#[from] StoreError),
}

impl ManagerError {
    /// Builds an `InvalidInput` error without a suggestion.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Builds a `NotFound` error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Builds a `Storage` error from an I/O failure on `path`.
    pub fn storage(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            code: err.raw_os_error(),
            message: err.to_string(),
        }
    }

    /// Wraps this error with the deployment step it happened in.
    pub fn at_step(self, step: DeployStep) -> Self {
        Self::Deploy {
            step,
            source: Box::new(self),
        }
    }

    /// Returns the deployment step this error happened in, if any.
    pub fn deploy_step(&self) -> Option<DeployStep> {
        match self {
            Self::Deploy { step, .. } => Some(*step),
            _ => None,
        }
    }

    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Storage { .. } => ErrorKind::StorageError,
            Self::ExecutionFailed { .. } => ErrorKind::ExecutionFailed,
            Self::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            Self::Deploy { source, .. } => source.kind(),
            Self::Store(e) => match e {
                StoreError::Conflict { .. } => ErrorKind::Conflict,
                StoreError::NotFound { .. } => ErrorKind::NotFound,
                StoreError::Backend(_) | StoreError::Codec(_) => ErrorKind::StorageError,
            },
        }
    }
}

/// Section store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Checksum {checksum} already exists")]
    Conflict { checksum: String },

    #[error("Section {checksum} not found")]
    NotFound { checksum: String },

    #[error("Store backend failure: {0}")]
    Backend(String),

    #[error("Failed to decode stored field: {0}")]
    Codec(#[from] CodecError),
}

/// Field codec errors.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Invalid base64 payload: {0}")]
    Base64(String),

    #[error("Invalid JSON payload: {0}")]
    Json(String),
}

/// Configuration loading and parsing errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {message}")]
    ParseFailed { path: PathBuf, message: String },

    #[error("Config validation failed with {error_count} error(s)")]
    ValidationFailed { error_count: usize },
}

/// Metrics registry errors.
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Prometheus metrics failure: {0}")]
    Prometheus(String),
}
