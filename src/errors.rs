use thiserror::Error;

use crate::models::ConnectionState;

/// Top-level client error. Decode faults live in [`crate::protocol::DecodeError`]
/// because they never leave the session; server-reported faults are not errors
/// at all and surface as [`crate::service::ClientUpdate::ServerError`].
#[derive(Debug, Error)]
pub enum ChatError {
    // ── Transport errors ─────────────────────────────────────────────────────
    #[error("Handshake with {endpoint} failed: {reason}")]
    HandshakeFailed { endpoint: String, reason: String },

    #[error("Handshake with {endpoint} timed out after {secs}s")]
    HandshakeTimedOut { endpoint: String, secs: u64 },

    #[error("Transport handle is closed")]
    TransportClosed,

    #[error("Transport fault: {0}")]
    TransportFault(String),

    // ── Invalid local actions ────────────────────────────────────────────────
    #[error("Cannot send while {state}")]
    InvalidSendState { state: ConnectionState },

    #[error("Message cannot be empty")]
    EmptyMessage,

    // ── Configuration errors ─────────────────────────────────────────────────
    #[error("Missing configuration value '{key}'")]
    MissingConfig { key: String },

    #[error("Invalid configuration value '{key}': {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    // ── Encoding errors ──────────────────────────────────────────────────────
    #[error("Failed to encode outbound frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ChatError {
    pub fn handshake(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        ChatError::HandshakeFailed {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_config(key: impl Into<String>, reason: impl ToString) -> Self {
        ChatError::InvalidConfig {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ChatError::HandshakeFailed { .. }
                | ChatError::HandshakeTimedOut { .. }
                | ChatError::TransportClosed
                | ChatError::TransportFault(_)
        )
    }

    pub fn is_invalid_action(&self) -> bool {
        matches!(self, ChatError::InvalidSendState { .. } | ChatError::EmptyMessage)
    }

    pub fn is_config(&self) -> bool {
        matches!(
            self,
            ChatError::MissingConfig { .. }
                | ChatError::InvalidConfig { .. }
                | ChatError::InvalidEndpoint { .. }
        )
    }
}
