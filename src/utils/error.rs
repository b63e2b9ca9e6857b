use std::time::Duration;
use thiserror::Error;

/// Why a retrieval produced no document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalFailure {
    /// The repository answered but carried zero attachments.
    NoAttachments,
}

impl std::fmt::Display for RetrievalFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetrievalFailure::NoAttachments => write!(f, "response carried no attachments"),
        }
    }
}

#[derive(Error, Debug)]
pub enum XdsError {
    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value for '{field}' ('{value}'): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Retrieval error: {reason}")]
    RetrievalError { reason: RetrievalFailure },

    #[error("Transport unavailable: {message}")]
    TransportUnavailable { message: String },

    #[error("Document with uniqueId '{unique_id}' already exists in the registry")]
    DuplicateUniqueId { unique_id: String },

    #[error("{operation} did not complete within {after:?}")]
    DeadlineExceeded {
        operation: &'static str,
        after: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Validation,
    Retrieval,
    Transport,
    Duplicate,
    Storage,
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl XdsError {
    pub fn config(message: impl Into<String>) -> Self {
        XdsError::ConfigError {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        XdsError::ValidationError {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        XdsError::TransportUnavailable {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            XdsError::ConfigError { .. }
            | XdsError::InvalidConfigValueError { .. }
            | XdsError::MissingConfigError { .. } => ErrorCategory::Configuration,
            XdsError::ValidationError { .. } => ErrorCategory::Validation,
            XdsError::RetrievalError { .. } => ErrorCategory::Retrieval,
            XdsError::ApiError(_)
            | XdsError::SerializationError(_)
            | XdsError::TransportUnavailable { .. } => ErrorCategory::Transport,
            XdsError::DuplicateUniqueId { .. } => ErrorCategory::Duplicate,
            XdsError::IoError(_) => ErrorCategory::Storage,
            XdsError::DeadlineExceeded { .. } => ErrorCategory::Timeout,
        }
    }

    /// Fail-fast input errors are raised before any transport call.
    pub fn is_configuration(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Retrieval | ErrorCategory::Duplicate => ErrorSeverity::Low,
            ErrorCategory::Transport | ErrorCategory::Timeout => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Validation => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    /// Process exit code for a command that ended with this error. Never 0: a refused
    /// submission or a missing document is not a success.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low | ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Check the endpoint URIs, organizational OID and keystore settings"
            }
            ErrorCategory::Validation => {
                "Complete the document metadata profile and submit again"
            }
            ErrorCategory::Retrieval => "The repository does not hold the requested document",
            ErrorCategory::Transport => "Retry later; the registry or repository is unreachable",
            ErrorCategory::Duplicate => {
                "Use a new uniqueId or replace the existing document instead of resubmitting"
            }
            ErrorCategory::Storage => "Check permissions and free space of the output directory",
            ErrorCategory::Timeout => "Increase session.deadline_seconds or retry later",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            XdsError::RetrievalError { .. } => "Document not found in repository".to_string(),
            XdsError::DuplicateUniqueId { unique_id } => {
                format!("Document {} already exists", unique_id)
            }
            XdsError::TransportUnavailable { .. } | XdsError::ApiError(_) => {
                "Document sharing endpoint is not reachable".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, XdsError>;
