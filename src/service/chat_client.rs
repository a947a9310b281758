use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::errors::ChatError;
use crate::models::{ConnectionState, MessageRecord, SessionParams};
use crate::protocol::{decode, decode_bytes, DecodeError};
use crate::service::dispatcher::OutboundDispatcher;
use crate::session::{ChatSession, SessionEffect, SessionEvent};
use crate::transport::{ConnectionManager, ConnectionNotice, RawFrame, Transport};

/// What the presentation layer is told after each event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientUpdate {
    State(ConnectionState),
    /// The session log changed; re-read [`ChatClient::records`].
    LogChanged,
    /// The assistant failed. The connection is fine.
    ServerError(String),
    /// The connection failed.
    TransportError(String),
}

/// Session controller: owns the connection, the session state and the
/// dispatcher, and runs the single event loop that ties them together.
///
/// All mutation happens inside [`ChatClient::next_update`] or one of the
/// action methods, one event at a time.
pub struct ChatClient<T: Transport> {
    endpoint: String,
    params: SessionParams,
    connection: ConnectionManager<T>,
    session: ChatSession,
    dispatcher: OutboundDispatcher,
    pending: VecDeque<ClientUpdate>,
}

impl<T: Transport> ChatClient<T> {
    pub fn new(transport: T, config: &ClientConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            params: config.params.clone(),
            connection: ConnectionManager::new(transport, config.handshake_timeout),
            session: ChatSession::new(),
            dispatcher: OutboundDispatcher::new(&config.params),
            pending: VecDeque::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn params(&self) -> &SessionParams {
        &self.params
    }

    /// The session log, in display order.
    pub fn records(&self) -> &[MessageRecord] {
        self.session.records()
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    pub fn failed_attempts(&self) -> u32 {
        self.connection.failed_attempts()
    }

    /// Connects unless already connecting or connected.
    pub fn open(&mut self) -> Result<(), ChatError> {
        let notices = self.connection.open(&self.endpoint, &self.params)?;
        self.absorb(notices);
        Ok(())
    }

    pub fn close(&mut self, reason: &str) {
        let notices = self.connection.close(reason);
        self.absorb(notices);
    }

    pub fn send(&mut self, text: &str) -> Result<(), ChatError> {
        let effect = self.dispatcher.send(&self.connection, &mut self.session, text)?;
        self.push_effect(effect);
        Ok(())
    }

    pub fn new_session(&mut self) {
        let effect = self.dispatcher.new_session(&self.connection, &mut self.session);
        self.push_effect(effect);
    }

    pub fn request_history(&mut self) -> Result<(), ChatError> {
        self.dispatcher.request_history(&self.connection)
    }

    /// Waits for the next thing worth telling the UI about.
    ///
    /// Cancel-safe: dropping the future before it resolves loses nothing.
    pub async fn next_update(&mut self) -> ClientUpdate {
        loop {
            if let Some(update) = self.pending.pop_front() {
                return update;
            }
            let event = self.connection.next_event().await;
            let notices = self.connection.handle(event);
            self.absorb(notices);
        }
    }

    fn absorb(&mut self, notices: Vec<ConnectionNotice>) {
        for notice in notices {
            match notice {
                ConnectionNotice::State(state) => {
                    if state == ConnectionState::Disconnected {
                        self.session.apply(SessionEvent::TransportLost);
                    }
                    self.pending.push_back(ClientUpdate::State(state));
                }
                ConnectionNotice::Fault(reason) => {
                    self.pending.push_back(ClientUpdate::TransportError(reason))
                }
                ConnectionNotice::Frame(frame) => self.on_frame(frame),
            }
        }
    }

    fn on_frame(&mut self, frame: RawFrame) {
        let decoded = match &frame {
            RawFrame::Text(text) => decode(text),
            RawFrame::Binary(bytes) => decode_bytes(bytes),
        };
        match decoded {
            Ok(envelope) => {
                debug!(kind = envelope.kind(), "frame received");
                let effect = self.session.apply(SessionEvent::Inbound(envelope));
                self.push_effect(effect);
            }
            Err(DecodeError::UnknownType(kind)) => warn!(kind, "discarding frame of unknown type"),
            Err(e) => warn!("discarding undecodable frame: {e}"),
        }
    }

    fn push_effect(&mut self, effect: SessionEffect) {
        match effect {
            SessionEffect::Unchanged => {}
            SessionEffect::LogChanged => self.pending.push_back(ClientUpdate::LogChanged),
            SessionEffect::ServerError(message) => {
                self.pending.push_back(ClientUpdate::ServerError(message))
            }
        }
    }
}
