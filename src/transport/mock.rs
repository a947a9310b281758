//! In-memory transport for unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use url::Url;

use crate::errors::ChatError;
use crate::transport::{Link, RawFrame, Transport};

#[derive(Default)]
struct Inner {
    attempts: usize,
    hold: bool,
    refuse: VecDeque<String>,
    peers: VecDeque<MockPeer>,
    last_url: Option<Url>,
}

/// Counts handshakes and hands out a [`MockPeer`] for every accepted one.
#[derive(Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

/// The server end of one mock connection.
pub struct MockPeer {
    inbound: mpsc::UnboundedSender<Result<RawFrame, ChatError>>,
    sent: mpsc::UnboundedReceiver<String>,
}

enum Handshake {
    Hold,
    Refuse(String),
    Accept(Link),
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.inner.lock().unwrap().attempts
    }

    pub fn last_url(&self) -> Option<Url> {
        self.inner.lock().unwrap().last_url.clone()
    }

    /// Handshakes never complete until this is undone.
    pub fn hold_handshakes(&self) {
        self.inner.lock().unwrap().hold = true;
    }

    pub fn release_handshakes(&self) {
        self.inner.lock().unwrap().hold = false;
    }

    pub fn refuse_next(&self, reason: &str) {
        self.inner.lock().unwrap().refuse.push_back(reason.to_string());
    }

    pub fn take_peer(&self) -> Option<MockPeer> {
        self.inner.lock().unwrap().peers.pop_front()
    }
}

impl Transport for MockTransport {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<Link, ChatError>> {
        let mut inner = self.inner.lock().unwrap();
        inner.attempts += 1;
        inner.last_url = Some(url.clone());

        let handshake = if inner.hold {
            Handshake::Hold
        } else if let Some(reason) = inner.refuse.pop_front() {
            Handshake::Refuse(reason)
        } else {
            let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
            let (sent_tx, sent_rx) = mpsc::unbounded_channel();
            inner.peers.push_back(MockPeer { inbound: inbound_tx, sent: sent_rx });

            let stream = futures_util::stream::unfold(inbound_rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            });
            let sink = futures_util::sink::unfold(
                sent_tx,
                |tx: mpsc::UnboundedSender<String>, frame: String| async move {
                    tx.send(frame).map_err(|_| ChatError::TransportClosed)?;
                    Ok::<_, ChatError>(tx)
                },
            );
            Handshake::Accept(Link {
                sink: Box::pin(sink),
                stream: stream.boxed(),
            })
        };
        drop(inner);

        async move {
            match handshake {
                Handshake::Hold => std::future::pending().await,
                Handshake::Refuse(reason) => Err(ChatError::handshake("mock://chat", reason)),
                Handshake::Accept(link) => Ok(link),
            }
        }
        .boxed()
    }
}

impl MockPeer {
    /// Delivers a text frame to the client. Ignored once the client is gone.
    pub fn push(&self, frame: &str) {
        let _ = self.inbound.send(Ok(RawFrame::Text(frame.to_string())));
    }

    pub fn push_binary(&self, frame: &[u8]) {
        let _ = self.inbound.send(Ok(RawFrame::Binary(frame.to_vec())));
    }

    /// Breaks the connection with a transport error.
    pub fn fail(&self, reason: &str) {
        let _ = self.inbound.send(Err(ChatError::TransportFault(reason.to_string())));
    }

    /// Ends the inbound stream, as if the server closed the socket.
    pub fn hang_up(self) {
        drop(self);
    }

    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    pub fn try_next_sent(&mut self) -> Option<String> {
        self.sent.try_recv().ok()
    }
}
