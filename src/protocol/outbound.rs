use serde::{Deserialize, Serialize};

use crate::errors::ChatError;

/// A frame the client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    /// `{type:"message", message, roomId, userId}`
    Message {
        message: String,
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    /// `{type:"new_chat", roomId}`
    NewChat {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    /// `{type:"get_history", roomId}`
    GetHistory {
        #[serde(rename = "roomId")]
        room_id: String,
    },
}

impl OutboundFrame {
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundFrame::Message { .. } => "message",
            OutboundFrame::NewChat { .. } => "new_chat",
            OutboundFrame::GetHistory { .. } => "get_history",
        }
    }

    pub fn encode(&self) -> Result<String, ChatError> {
        Ok(serde_json::to_string(self)?)
    }
}
