//! The persistent, ordered, message-framed connection to the chat endpoint.

pub mod backoff;
pub mod connection;
#[cfg(test)]
pub mod mock;
pub mod websocket;

use std::pin::Pin;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::Sink;
use url::Url;

use crate::errors::ChatError;
use crate::models::SessionParams;

pub use backoff::ReconnectPolicy;
pub use connection::{ConnectionManager, ConnectionNotice};
pub use websocket::WebSocketTransport;

/// One inbound transport frame, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFrame {
    Text(String),
    Binary(Vec<u8>),
}

pub type FrameSink = Pin<Box<dyn Sink<String, Error = ChatError> + Send>>;
pub type FrameStream = BoxStream<'static, Result<RawFrame, ChatError>>;

/// Both halves of an established connection. The stream ending means the
/// peer closed it.
pub struct Link {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Something that can perform the handshake.
///
/// `connect` runs its synchronous part immediately and returns a detached
/// future, so the connection manager can hand the handshake to a task.
pub trait Transport: Send + Sync + 'static {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<Link, ChatError>>;
}

/// Event produced by a connection task, stamped with the generation of the
/// `open()` call that spawned it.
#[derive(Debug)]
pub struct TransportEvent {
    pub generation: u64,
    pub kind: TransportEventKind,
}

#[derive(Debug)]
pub enum TransportEventKind {
    Opened,
    Frame(RawFrame),
    /// The peer ended the stream.
    Closed,
    Failed(ChatError),
}

/// Endpoint plus the identity query parameters the server expects.
pub fn connect_url(endpoint: &str, params: &SessionParams) -> Result<Url, ChatError> {
    let invalid = |reason: String| ChatError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason,
    };

    let mut url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    }
    url.query_pairs_mut()
        .append_pair("userId", &params.user_id)
        .append_pair("roomId", &params.room_id);
    Ok(url)
}
