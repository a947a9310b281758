use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of the single chat connection. Owned by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Errored,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Errored => "errored",
        }
    }

    /// Legal moves of one reconnect cycle:
    /// `disconnected → connecting → {connected | errored} → disconnected`,
    /// plus the explicit `close()` edge from any live state back to `disconnected`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Errored)
                | (Connected, Errored)
                | (Errored, Disconnected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Author of a message. The server may label the assistant however it likes
/// ("bot", "assistant", "Dr. Max"); anything that is not `user` is the bot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Sender {
    User,
    Bot,
}

impl Sender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Sender {
    fn from(s: String) -> Self {
        if s.trim().eq_ignore_ascii_case("user") {
            Sender::User
        } else {
            Sender::Bot
        }
    }
}

/// One entry of the session log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    /// True while the stream assembler may still append to `text`.
    pub streaming: bool,
}

impl MessageRecord {
    /// A complete record with a locally minted id.
    pub fn local(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            sender,
            text: text.into(),
            timestamp: Utc::now(),
            streaming: false,
        }
    }

    /// An in-flight record keyed by the server-supplied message id.
    pub fn open_stream(
        id: impl Into<String>,
        sender: Sender,
        initial_text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            sender,
            text: initial_text.into(),
            timestamp: Utc::now(),
            streaming: true,
        }
    }
}

/// Identity passed to the transport at connect time. Supplied pre-authenticated
/// by whatever sits in front of the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionParams {
    pub user_id: String,
    pub room_id: String,
}

impl SessionParams {
    pub fn new(user_id: impl Into<String>, room_id: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), room_id: room_id.into() }
    }
}
