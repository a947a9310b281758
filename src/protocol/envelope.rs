use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::models::{MessageRecord, Sender};
use crate::protocol::outbound::OutboundFrame;

/// Discriminators the server may put in `type`.
pub const INBOUND_TYPES: &[&str] = &[
    "message",
    "llm_response_start",
    "llm_response_chunk",
    "llm_response_end",
    "history",
    "status",
    "error",
];

/// Discriminators the client itself emits.
pub const OUTBOUND_TYPES: &[&str] = &["message", "new_chat", "get_history"];

/// Why an inbound frame was discarded. Never fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    #[error("frame is not valid JSON: {0}")]
    Malformed(String),

    #[error("frame is not a JSON object")]
    NotAnObject,

    #[error("frame has no 'type' discriminator")]
    MissingType,

    #[error("unknown frame type '{0}'")]
    UnknownType(String),

    #[error("invalid '{kind}' frame: {reason}")]
    InvalidField { kind: String, reason: String },
}

/// A decoded inbound frame, discriminated by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub enum Envelope {
    /// A complete, non-streamed message.
    Message { text: String, sender: Sender },

    StreamStart {
        message_id: String,
        sender: Sender,
        initial_text: Option<String>,
    },

    StreamChunk { message_id: String, delta: String },

    StreamEnd { message_id: String },

    /// Replaces the session log wholesale.
    History { messages: Vec<HistoryEntry> },

    Status { text: String },

    /// A server-reported fault. Never touches the session log.
    Error { message: String },
}

impl Envelope {
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Message { .. } => "message",
            Envelope::StreamStart { .. } => "llm_response_start",
            Envelope::StreamChunk { .. } => "llm_response_chunk",
            Envelope::StreamEnd { .. } => "llm_response_end",
            Envelope::History { .. } => "history",
            Envelope::Status { .. } => "status",
            Envelope::Error { .. } => "error",
        }
    }
}

/// Wire shape of an inbound frame. Snake and camel spellings of a field are
/// separate keys here so a frame carrying both still decodes.
#[derive(Deserialize)]
#[serde(tag = "type")]
enum RawEnvelope {
    #[serde(rename = "message")]
    Message { text: String, sender: Sender },

    #[serde(rename = "llm_response_start")]
    StreamStart {
        #[serde(flatten)]
        id: RawMessageId,
        sender: Sender,
        #[serde(default)]
        initial_text: Option<String>,
        #[serde(default, rename = "initialText")]
        initial_text_camel: Option<String>,
    },

    #[serde(rename = "llm_response_chunk")]
    StreamChunk {
        #[serde(flatten)]
        id: RawMessageId,
        delta: String,
    },

    #[serde(rename = "llm_response_end")]
    StreamEnd {
        #[serde(flatten)]
        id: RawMessageId,
    },

    #[serde(rename = "history")]
    History { messages: Vec<HistoryEntry> },

    #[serde(rename = "status")]
    Status { text: String },

    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Deserialize)]
struct RawMessageId {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default, rename = "messageId")]
    message_id_camel: Option<String>,
}

impl RawMessageId {
    fn resolve(self) -> Result<String, String> {
        self.message_id
            .or(self.message_id_camel)
            .ok_or_else(|| "missing field `message_id`".to_string())
    }
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = String;

    fn try_from(raw: RawEnvelope) -> Result<Self, <Envelope as TryFrom<RawEnvelope>>::Error> {
        Ok(match raw {
            RawEnvelope::Message { text, sender } => Envelope::Message { text, sender },
            RawEnvelope::StreamStart { id, sender, initial_text, initial_text_camel } => {
                Envelope::StreamStart {
                    message_id: id.resolve()?,
                    sender,
                    initial_text: initial_text.or(initial_text_camel),
                }
            }
            RawEnvelope::StreamChunk { id, delta } => Envelope::StreamChunk {
                message_id: id.resolve()?,
                delta,
            },
            RawEnvelope::StreamEnd { id } => Envelope::StreamEnd {
                message_id: id.resolve()?,
            },
            RawEnvelope::History { messages } => Envelope::History { messages },
            RawEnvelope::Status { text } => Envelope::Status { text },
            RawEnvelope::Error { message } => Envelope::Error { message },
        })
    }
}

/// One message of a `history` frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawHistoryEntry")]
pub struct HistoryEntry {
    pub id: Option<String>,
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Deserialize)]
struct RawHistoryEntry {
    #[serde(default)]
    id: Option<String>,
    sender: Sender,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
}

impl TryFrom<RawHistoryEntry> for HistoryEntry {
    type Error = String;

    fn try_from(raw: RawHistoryEntry) -> Result<Self, Self::Error> {
        let text = raw
            .content
            .or(raw.text)
            .ok_or_else(|| "history entry has neither `content` nor `text`".to_string())?;
        Ok(HistoryEntry {
            id: raw.id,
            sender: raw.sender,
            text,
            timestamp: raw.timestamp,
        })
    }
}

impl From<HistoryEntry> for MessageRecord {
    fn from(entry: HistoryEntry) -> Self {
        MessageRecord {
            id: entry.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            sender: entry.sender,
            text: entry.text,
            timestamp: entry.timestamp,
            streaming: false,
        }
    }
}

/// Accepts RFC 3339, a zone-less ISO timestamp (taken as UTC), or epoch milliseconds.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Millis(ms) => DateTime::from_timestamp_millis(ms)
            .ok_or_else(|| de::Error::custom(format!("timestamp out of range: {ms}"))),
        Raw::Text(s) => {
            if let Ok(t) = DateTime::parse_from_rfc3339(&s) {
                return Ok(t.with_timezone(&Utc));
            }
            NaiveDateTime::parse_from_str(&s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| naive.and_utc())
                .map_err(|e| de::Error::custom(format!("invalid timestamp '{s}': {e}")))
        }
    }
}

/// Decodes one inbound text frame.
pub fn decode(raw: &str) -> Result<Envelope, DecodeError> {
    decode_tagged(raw, INBOUND_TYPES)
}

/// Decodes one inbound binary frame, which must carry UTF-8 JSON.
pub fn decode_bytes(raw: &[u8]) -> Result<Envelope, DecodeError> {
    let text =
        std::str::from_utf8(raw).map_err(|e| DecodeError::InvalidEncoding(e.to_string()))?;
    decode(text)
}

/// Decodes a frame the client itself produced. Used to check that what goes
/// out on the wire carries every field of the action.
pub fn decode_outbound(raw: &str) -> Result<OutboundFrame, DecodeError> {
    decode_tagged(raw, OUTBOUND_TYPES)
}

fn decode_tagged<T: DeserializeOwned>(raw: &str, known: &[&str]) -> Result<T, DecodeError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

    let kind = match &value {
        Value::Object(map) => match map.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => {
                return Err(DecodeError::InvalidField {
                    kind: "?".to_string(),
                    reason: "'type' is not a string".to_string(),
                })
            }
            None => return Err(DecodeError::MissingType),
        },
        _ => return Err(DecodeError::NotAnObject),
    };

    if !known.contains(&kind.as_str()) {
        return Err(DecodeError::UnknownType(kind));
    }

    serde_json::from_value(value).map_err(|e| DecodeError::InvalidField {
        kind,
        reason: e.to_string(),
    })
}
