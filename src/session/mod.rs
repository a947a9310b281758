//! Local chat state: the session log and the reducer that feeds it.

pub mod assembler;
pub mod log;

use tracing::{debug, info, warn};

use crate::models::{MessageRecord, Sender};
use crate::protocol::Envelope;

pub use assembler::StreamAssembler;
pub use log::SessionLog;

/// Everything that can change the session log.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A decoded frame from the server.
    Inbound(Envelope),
    /// The user's own message, echoed before the server acknowledges it.
    LocalEcho(MessageRecord),
    /// The user started a new chat.
    Reset,
    /// The connection went away. Open streams freeze where they are.
    TransportLost,
}

/// What applying an event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEffect {
    Unchanged,
    LogChanged,
    /// The server reported a fault. The log is untouched.
    ServerError(String),
}

/// Owns the session log and the stream assembler and keeps them consistent.
#[derive(Debug, Default)]
pub struct ChatSession {
    log: SessionLog,
    assembler: StreamAssembler,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn records(&self) -> &[MessageRecord] {
        self.log.records()
    }

    pub fn open_streams(&self) -> usize {
        self.assembler.in_flight()
    }

    /// Applies one event and reports whether the log changed.
    pub fn apply(&mut self, event: SessionEvent) -> SessionEffect {
        let changed = match event {
            SessionEvent::Inbound(envelope) => return self.apply_envelope(envelope),
            SessionEvent::LocalEcho(record) => {
                self.log.append(record);
                true
            }
            SessionEvent::Reset => {
                self.log.clear();
                self.assembler.reset();
                info!("session log cleared");
                true
            }
            SessionEvent::TransportLost => {
                self.assembler.freeze();
                false
            }
        };
        effect(changed)
    }

    fn apply_envelope(&mut self, envelope: Envelope) -> SessionEffect {
        let changed = match envelope {
            Envelope::Message { text, sender } => {
                self.log.append(MessageRecord::local(sender, text));
                true
            }
            Envelope::StreamStart {
                message_id,
                sender,
                initial_text,
            } => self.assembler.on_stream_start(
                &mut self.log,
                &message_id,
                sender,
                initial_text.as_deref().unwrap_or_default(),
            ),
            Envelope::StreamChunk { message_id, delta } => {
                self.assembler.on_stream_chunk(&mut self.log, &message_id, &delta)
            }
            Envelope::StreamEnd { message_id } => {
                self.assembler.on_stream_end(&mut self.log, &message_id)
            }
            Envelope::History { messages } => {
                let count = messages.len();
                self.log.replace(messages.into_iter().map(MessageRecord::from).collect());
                self.assembler.reset();
                debug!(count, "session log replaced from history");
                true
            }
            Envelope::Status { text } => {
                self.log.append(MessageRecord::local(Sender::Bot, text));
                true
            }
            Envelope::Error { message } => {
                warn!("server reported error: {message}");
                return SessionEffect::ServerError(message);
            }
        };
        effect(changed)
    }
}

fn effect(changed: bool) -> SessionEffect {
    if changed {
        SessionEffect::LogChanged
    } else {
        SessionEffect::Unchanged
    }
}
