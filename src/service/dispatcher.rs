use tracing::{debug, warn};

use crate::errors::ChatError;
use crate::models::{ConnectionState, MessageRecord, SessionParams, Sender};
use crate::protocol::OutboundFrame;
use crate::session::{ChatSession, SessionEffect, SessionEvent};
use crate::transport::{ConnectionManager, Transport};

/// Turns user actions into outbound frames, gated on the connection state.
#[derive(Debug, Clone)]
pub struct OutboundDispatcher {
    room_id: String,
    user_id: String,
}

impl OutboundDispatcher {
    pub fn new(params: &SessionParams) -> Self {
        Self { room_id: params.room_id.clone(), user_id: params.user_id.clone() }
    }

    /// Sends a user message and echoes it into the log right away.
    ///
    /// Rejected without side effects unless connected and `text` has
    /// something besides whitespace.
    pub fn send<T: Transport>(
        &self,
        connection: &ConnectionManager<T>,
        session: &mut ChatSession,
        text: &str,
    ) -> Result<SessionEffect, ChatError> {
        ensure_connected(connection.state())?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let frame = OutboundFrame::Message {
            message: text.to_string(),
            room_id: self.room_id.clone(),
            user_id: self.user_id.clone(),
        };
        connection.send(frame.encode()?)?;
        debug!(chars = text.len(), "message sent");

        Ok(session.apply(SessionEvent::LocalEcho(MessageRecord::local(Sender::User, text))))
    }

    /// Clears the log. Tells the server too when connected, best effort.
    /// Allowed in any state.
    pub fn new_session<T: Transport>(
        &self,
        connection: &ConnectionManager<T>,
        session: &mut ChatSession,
    ) -> SessionEffect {
        let effect = session.apply(SessionEvent::Reset);
        if connection.state() == ConnectionState::Connected {
            let frame = OutboundFrame::NewChat { room_id: self.room_id.clone() };
            if let Err(e) = frame.encode().and_then(|raw| connection.send(raw)) {
                warn!("could not notify server of new chat: {e}");
            }
        }
        effect
    }

    pub fn request_history<T: Transport>(
        &self,
        connection: &ConnectionManager<T>,
    ) -> Result<(), ChatError> {
        ensure_connected(connection.state())?;
        let frame = OutboundFrame::GetHistory { room_id: self.room_id.clone() };
        connection.send(frame.encode()?)
    }
}

fn ensure_connected(state: ConnectionState) -> Result<(), ChatError> {
    if state == ConnectionState::Connected {
        Ok(())
    } else {
        Err(ChatError::InvalidSendState { state })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::protocol::decode_outbound;
    use crate::transport::mock::MockTransport;

    fn params() -> SessionParams {
        SessionParams::new("u-7", "room-3")
    }

    async fn connected() -> (MockTransport, ConnectionManager<MockTransport>) {
        let transport = MockTransport::new();
        let mut mgr = ConnectionManager::new(transport.clone(), Duration::from_secs(5));
        mgr.open("ws://localhost/ws", &params()).unwrap();
        let event = mgr.next_event().await;
        mgr.handle(event);
        assert_eq!(mgr.state(), ConnectionState::Connected);
        (transport, mgr)
    }

    #[tokio::test]
    async fn send_echoes_and_emits_frame() {
        let (transport, mgr) = connected().await;
        let mut peer = transport.take_peer().unwrap();
        let mut session = ChatSession::new();
        let dispatcher = OutboundDispatcher::new(&params());

        let effect = dispatcher.send(&mgr, &mut session, "  chest pain since monday \n").unwrap();
        assert_eq!(effect, SessionEffect::LogChanged);

        let echo = &session.records()[0];
        assert_eq!(echo.sender, Sender::User);
        assert_eq!(echo.text, "chest pain since monday");
        assert!(!echo.streaming);

        let sent = peer.next_sent().await.unwrap();
        assert_eq!(
            decode_outbound(&sent).unwrap(),
            OutboundFrame::Message {
                message: "chest pain since monday".into(),
                room_id: "room-3".into(),
                user_id: "u-7".into(),
            }
        );
    }

    #[tokio::test]
    async fn send_while_not_connected_has_no_effect() {
        let transport = MockTransport::new();
        transport.hold_handshakes();
        let mut mgr = ConnectionManager::new(transport, Duration::from_secs(5));
        let mut session = ChatSession::new();
        let dispatcher = OutboundDispatcher::new(&params());

        let err = dispatcher.send(&mgr, &mut session, "hello").unwrap_err();
        assert!(matches!(
            err,
            ChatError::InvalidSendState { state: ConnectionState::Disconnected }
        ));

        mgr.open("ws://localhost/ws", &params()).unwrap();
        let err = dispatcher.send(&mgr, &mut session, "hello").unwrap_err();
        assert!(matches!(err, ChatError::InvalidSendState { state: ConnectionState::Connecting }));

        assert!(session.log().is_empty());
    }

    #[tokio::test]
    async fn blank_text_is_rejected() {
        let (transport, mgr) = connected().await;
        let mut peer = transport.take_peer().unwrap();
        let mut session = ChatSession::new();
        let dispatcher = OutboundDispatcher::new(&params());

        let blank = dispatcher.send(&mgr, &mut session, " \t ");
        assert!(matches!(blank, Err(ChatError::EmptyMessage)));
        assert!(session.log().is_empty());
        assert!(peer.try_next_sent().is_none());
    }

    #[tokio::test]
    async fn new_session_always_clears_and_notifies_when_connected() {
        let dispatcher = OutboundDispatcher::new(&params());

        let offline = ConnectionManager::new(MockTransport::new(), Duration::from_secs(5));
        let mut session = ChatSession::new();
        session.apply(SessionEvent::LocalEcho(MessageRecord::local(Sender::User, "old")));
        assert_eq!(dispatcher.new_session(&offline, &mut session), SessionEffect::LogChanged);
        assert!(session.log().is_empty());

        let (transport, online) = connected().await;
        let mut peer = transport.take_peer().unwrap();
        session.apply(SessionEvent::LocalEcho(MessageRecord::local(Sender::User, "old")));
        dispatcher.new_session(&online, &mut session);
        assert!(session.log().is_empty());
        assert_eq!(
            decode_outbound(&peer.next_sent().await.unwrap()).unwrap(),
            OutboundFrame::NewChat { room_id: "room-3".into() }
        );
    }

    #[tokio::test]
    async fn history_request_requires_connection() {
        let dispatcher = OutboundDispatcher::new(&params());
        let offline = ConnectionManager::new(MockTransport::new(), Duration::from_secs(5));
        assert!(dispatcher.request_history(&offline).unwrap_err().is_invalid_action());

        let (transport, online) = connected().await;
        let mut peer = transport.take_peer().unwrap();
        dispatcher.request_history(&online).unwrap();
        assert_eq!(
            decode_outbound(&peer.next_sent().await.unwrap()).unwrap(),
            OutboundFrame::GetHistory { room_id: "room-3".into() }
        );
    }
}
