use std::time::Duration;

use url::Url;

use crate::errors::ChatError;
use crate::models::SessionParams;
use crate::transport::connect_url;

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8080/ws/chat";
const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
const TIMEOUT_KEY: &str = "DRMAX_HANDSHAKE_TIMEOUT_SECS";

/// Client settings, read from the environment (and `.env` via `dotenvy` in the binary).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub params: SessionParams,
    pub handshake_timeout: Duration,
    pub auto_reconnect: bool,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, params: SessionParams) -> Self {
        Self {
            endpoint: endpoint.into(),
            params,
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            auto_reconnect: false,
        }
    }

    pub fn from_env() -> Result<Self, ChatError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ChatError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let endpoint = get("DRMAX_WS_URL").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let user_id = get("DRMAX_USER_ID").ok_or_else(|| ChatError::MissingConfig {
            key: "DRMAX_USER_ID".to_string(),
        })?;
        let room_id = get("DRMAX_ROOM_ID").unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let handshake_timeout = match get(TIMEOUT_KEY) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(0) => return Err(ChatError::invalid_config(TIMEOUT_KEY, "must be positive")),
                Ok(secs) => Duration::from_secs(secs),
                Err(e) => return Err(ChatError::invalid_config(TIMEOUT_KEY, e)),
            },
            None => Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
        };

        let auto_reconnect = match get("DRMAX_AUTO_RECONNECT").as_deref() {
            None => false,
            Some("1" | "true" | "yes" | "on") => true,
            Some("0" | "false" | "no" | "off") => false,
            Some(other) => {
                return Err(ChatError::invalid_config(
                    "DRMAX_AUTO_RECONNECT",
                    format!("expected true/false, got '{other}'"),
                ))
            }
        };

        let config = Self {
            endpoint,
            params: SessionParams::new(user_id, room_id),
            handshake_timeout,
            auto_reconnect,
        };
        config.connect_url()?;
        Ok(config)
    }

    pub fn connect_url(&self) -> Result<Url, ChatError> {
        connect_url(&self.endpoint, &self.params)
    }
}
