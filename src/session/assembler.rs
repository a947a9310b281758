use std::collections::HashMap;

use tracing::{debug, warn};

use crate::models::{MessageRecord, Sender};
use crate::session::log::SessionLog;

/// Builds streamed responses in place inside the [`SessionLog`].
///
/// Tracks which message ids are still open and where their record sits in the
/// log. Fragments are appended in arrival order; the transport is trusted to
/// deliver them in send order, so nothing is buffered or reordered here.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    open: HashMap<String, usize>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_flight(&self) -> usize {
        self.open.len()
    }

    /// Opens a stream. Returns whether the log changed.
    ///
    /// A second start for an open id overwrites the first (server resend).
    /// A start for a record frozen by a lost connection revives it the same way.
    /// A start for an already sealed record is dropped: sealed records are final.
    pub fn on_stream_start(
        &mut self,
        log: &mut SessionLog,
        id: &str,
        sender: Sender,
        initial_text: &str,
    ) -> bool {
        let fresh = MessageRecord::open_stream(id, sender, initial_text);

        if let Some(&index) = self.open.get(id) {
            warn!(message_id = id, "duplicate stream start, restarting stream");
            if let Some(slot) = log.get_mut(index) {
                *slot = fresh;
                return true;
            }
            // Index no longer valid; fall through and append.
            self.open.remove(id);
        }

        if let Some(index) = log.position(id) {
            let Some(existing) = log.get_mut(index) else {
                return false;
            };
            if !existing.streaming {
                warn!(message_id = id, "stream start for sealed message ignored");
                return false;
            }
            warn!(message_id = id, "stream start for frozen message, restarting stream");
            *existing = fresh;
            self.open.insert(id.to_string(), index);
            return true;
        }

        let index = log.append(fresh);
        self.open.insert(id.to_string(), index);
        debug!(message_id = id, in_flight = self.open.len(), "stream opened");
        true
    }

    /// Appends a fragment. Unknown ids are dropped.
    pub fn on_stream_chunk(&mut self, log: &mut SessionLog, id: &str, delta: &str) -> bool {
        let Some(&index) = self.open.get(id) else {
            warn!(message_id = id, "chunk for unknown stream dropped");
            return false;
        };
        match log.get_mut(index) {
            Some(record) if record.id == id && record.streaming => {
                record.text.push_str(delta);
                true
            }
            _ => {
                warn!(message_id = id, "stream index out of sync, dropping stream");
                self.open.remove(id);
                false
            }
        }
    }

    /// Seals a stream. Unknown ids are a no-op.
    pub fn on_stream_end(&mut self, log: &mut SessionLog, id: &str) -> bool {
        let Some(index) = self.open.remove(id) else {
            warn!(message_id = id, "end for unknown stream ignored");
            return false;
        };
        match log.get_mut(index) {
            Some(record) if record.id == id => {
                record.streaming = false;
                debug!(message_id = id, chars = record.text.len(), "stream sealed");
                true
            }
            _ => false,
        }
    }

    /// Stops tracking every open stream without sealing it. Their records keep
    /// `streaming = true` and the partial text they had.
    pub fn freeze(&mut self) -> usize {
        let frozen = self.open.len();
        if frozen > 0 {
            warn!(frozen, "connection lost with streams in flight");
        }
        self.open.clear();
        frozen
    }

    /// Forgets all positions. Call after the log was replaced or cleared.
    pub fn reset(&mut self) {
        self.open.clear();
    }
}
