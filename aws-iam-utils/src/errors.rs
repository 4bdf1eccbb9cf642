//! Error types for policy analysis operations.

use thiserror::Error;

/// Errors that can occur while analysing, comparing or generating policies.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The action could not be resolved through the overrides or the upstream database.
    #[error("Unknown action: {action}")]
    UnknownAction {
        /// Fully-qualified `service:action` string that failed to resolve
        action: String,
    },

    /// The action exists but carries no access level in any data source.
    #[error("Action {action} has no access level")]
    MissingAccessLevel {
        /// Fully-qualified `service:action` string
        action: String,
    },

    /// A statement uses an inverting key that is only accepted with an explicit opt-in.
    #[error("Unsupported statement key: {key}")]
    UnsupportedKey {
        /// The offending key (`NotAction`, `NotPrincipal` or `NotResource`)
        key: String,
    },

    /// The action string is not of the form `service:action`.
    #[error("Malformed action: {action}")]
    MalformedAction {
        /// The raw action string
        action: String,
    },

    /// The service is not known to the action database.
    #[error("Unknown service: {service}{}", suggestion_suffix(.suggestion))]
    UnknownService {
        /// The requested service prefix
        service: String,
        /// Closest known service prefix, if any is reasonably close
        suggestion: Option<String>,
    },

    /// The ARN type is not defined for the service.
    #[error("Unknown ARN type {arn_type} for service {service}")]
    UnknownArnType {
        /// Service prefix
        service: String,
        /// Requested ARN type
        arn_type: String,
    },

    /// No action of the service matched the requested access levels.
    #[error("No actions of service {service} match access levels [{levels}]")]
    NoMatchingActions {
        /// Service prefix
        service: String,
        /// Comma-separated access levels
        levels: String,
    },

    /// Embedded or caller-supplied action data could not be loaded.
    #[error("Failed to load action data from {source_name}: {message}")]
    DataLoad {
        /// Name of the file or source that failed
        source_name: String,
        /// Description of the failure
        message: String,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A wildcard action could not be compiled into a glob pattern.
    #[error("Invalid wildcard pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

fn suggestion_suffix(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!(" (did you mean {s}?)"))
        .unwrap_or_default()
}

impl PolicyError {
    /// Create an unknown action error
    pub fn unknown_action(action: impl Into<String>) -> Self {
        Self::UnknownAction {
            action: action.into(),
        }
    }

    /// Create a missing access level error
    pub fn missing_access_level(action: impl Into<String>) -> Self {
        Self::MissingAccessLevel {
            action: action.into(),
        }
    }

    /// Create an unsupported key error
    pub fn unsupported_key(key: impl Into<String>) -> Self {
        Self::UnsupportedKey { key: key.into() }
    }

    /// Create a malformed action error
    pub fn malformed_action(action: impl Into<String>) -> Self {
        Self::MalformedAction {
            action: action.into(),
        }
    }

    /// Create a data load error
    pub fn data_load(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataLoad {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Result type for policy operations
pub type Result<T> = std::result::Result<T, PolicyError>;
