use crate::listener::ListenerToken;
use thiserror::Error;

/// Errors surfaced by the notification store and its gateways.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network failure or non-2xx response from the backend.
    #[error("transport error on {operation}: {message}")]
    Transport {
        operation: &'static str,
        status: Option<u16>,
        message: String,
    },

    /// The backend answered but the body could not be understood.
    #[error("failed to decode {operation} response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },

    /// The targeted notification is no longer in the latest cache.
    #[error("notification {id} no longer exists (action: {action})")]
    StaleAction { action: &'static str, id: String },

    /// The domain does not offer this action at all.
    #[error("action {action} is not supported by the {domain} domain")]
    UnsupportedAction {
        domain: &'static str,
        action: &'static str,
    },

    /// Suspensions and rejections must say why.
    #[error("action {action} requires a non-empty reason")]
    MissingReason { action: &'static str },

    /// The gateway could not be built from its configuration.
    #[error("invalid gateway configuration: {0}")]
    Config(String),

    /// The notification cannot drive this action (wrong category or no
    /// correlation id).
    #[error("notification {id} is not eligible for {action}: {reason}")]
    Ineligible {
        action: &'static str,
        id: String,
        reason: String,
    },
}

impl SyncError {
    pub fn transport(operation: &'static str, err: impl std::fmt::Display) -> Self {
        SyncError::Transport {
            operation,
            status: None,
            message: err.to_string(),
        }
    }

    pub fn status(operation: &'static str, status: u16, body: impl Into<String>) -> Self {
        SyncError::Transport {
            operation,
            status: Some(status),
            message: body.into(),
        }
    }

    pub fn decode(operation: &'static str, err: impl std::fmt::Display) -> Self {
        SyncError::Decode {
            operation,
            message: err.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, SyncError::Transport { .. } | SyncError::Decode { .. })
    }
}

/// A subscriber callback failed (returned an error or panicked) during
/// fan-out. Never propagated, only logged and handed back for reporting.
#[derive(Debug, Error)]
#[error("listener {token} failed: {message}")]
pub struct ListenerError {
    pub token: ListenerToken,
    pub message: String,
    pub panicked: bool,
}
