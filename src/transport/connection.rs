use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::errors::ChatError;
use crate::models::{ConnectionState, SessionParams};
use crate::transport::{
    connect_url, Link, RawFrame, Transport, TransportEvent, TransportEventKind,
};

/// What the rest of the client needs to hear about after the manager
/// processed an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionNotice {
    State(ConnectionState),
    Frame(RawFrame),
    /// Why the connection failed. Always followed by `errored` then `disconnected`.
    Fault(String),
}

/// Owns the one transport connection and its state.
///
/// Every `open()` starts a new generation. Events from the task of an older
/// generation are discarded, so a late frame from a replaced socket can never
/// reach the session.
pub struct ConnectionManager<T: Transport> {
    transport: T,
    state: ConnectionState,
    handshake_timeout: Duration,
    generation: u64,
    live_generation: Option<u64>,
    outbound: Option<mpsc::UnboundedSender<String>>,
    task: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    events_rx: mpsc::UnboundedReceiver<TransportEvent>,
    failed_attempts: u32,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, handshake_timeout: Duration) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            state: ConnectionState::Disconnected,
            handshake_timeout,
            generation: 0,
            live_generation: None,
            outbound: None,
            task: None,
            events_tx,
            events_rx,
            failed_attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive failed attempts since the last successful handshake.
    pub fn failed_attempts(&self) -> u32 {
        self.failed_attempts
    }

    /// Starts a handshake unless one is already under way or done.
    pub fn open(
        &mut self,
        endpoint: &str,
        params: &SessionParams,
    ) -> Result<Vec<ConnectionNotice>, ChatError> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => {
                debug!(state = %self.state, "open ignored, connection already live");
                return Ok(Vec::new());
            }
            ConnectionState::Disconnected | ConnectionState::Errored => {}
        }

        let url = connect_url(endpoint, params)?;
        let mut notices = Vec::new();
        if self.state == ConnectionState::Errored {
            notices.extend(self.transition(ConnectionState::Disconnected));
        }

        self.generation += 1;
        let generation = self.generation;
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let handshake = self.transport.connect(&url);

        info!(generation, endpoint, room_id = %params.room_id, "opening chat connection");
        self.task = Some(tokio::spawn(run_connection(
            generation,
            handshake,
            endpoint.to_string(),
            self.handshake_timeout,
            outbound_rx,
            self.events_tx.clone(),
        )));
        self.outbound = Some(outbound_tx);
        self.live_generation = Some(generation);
        notices.extend(self.transition(ConnectionState::Connecting));
        Ok(notices)
    }

    /// Drops the connection and lands in `disconnected`. Safe to repeat.
    /// Does not wait for queued frames to be acknowledged.
    pub fn close(&mut self, reason: &str) -> Vec<ConnectionNotice> {
        if let Some(task) = self.task.take() {
            if self.state == ConnectionState::Connecting {
                task.abort();
            }
        }
        self.release();

        if self.state == ConnectionState::Disconnected {
            return Vec::new();
        }
        info!(reason, state = %self.state, "closing chat connection");
        self.transition(ConnectionState::Disconnected).into_iter().collect()
    }

    /// Queues one encoded frame. Never blocks.
    pub fn send(&self, frame: String) -> Result<(), ChatError> {
        if self.state != ConnectionState::Connected {
            return Err(ChatError::InvalidSendState { state: self.state });
        }
        let outbound = self.outbound.as_ref().ok_or(ChatError::TransportClosed)?;
        outbound.send(frame).map_err(|_| ChatError::TransportClosed)
    }

    /// Waits for the next event from any connection task.
    pub async fn next_event(&mut self) -> TransportEvent {
        match self.events_rx.recv().await {
            Some(event) => event,
            // The manager holds a sender, so the channel never closes.
            None => std::future::pending().await,
        }
    }

    /// Applies one transport event to the state machine.
    pub fn handle(&mut self, event: TransportEvent) -> Vec<ConnectionNotice> {
        if self.live_generation != Some(event.generation) {
            debug!(generation = event.generation, "dropping event from stale connection");
            return Vec::new();
        }

        match event.kind {
            TransportEventKind::Opened => {
                self.failed_attempts = 0;
                self.transition(ConnectionState::Connected).into_iter().collect()
            }
            TransportEventKind::Frame(frame) => {
                if self.state == ConnectionState::Connected {
                    vec![ConnectionNotice::Frame(frame)]
                } else {
                    warn!(state = %self.state, "frame received outside connected state");
                    Vec::new()
                }
            }
            TransportEventKind::Closed => self.fail("connection closed by server".to_string()),
            TransportEventKind::Failed(err) => self.fail(err.to_string()),
        }
    }

    fn fail(&mut self, reason: String) -> Vec<ConnectionNotice> {
        error!(state = %self.state, "chat connection failed: {reason}");
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.task = None;
        self.release();

        let mut notices = vec![ConnectionNotice::Fault(reason)];
        notices.extend(self.transition(ConnectionState::Errored));
        notices.extend(self.transition(ConnectionState::Disconnected));
        notices
    }

    fn release(&mut self) {
        self.outbound = None;
        self.live_generation = None;
    }

    fn transition(&mut self, next: ConnectionState) -> Option<ConnectionNotice> {
        if self.state == next {
            return None;
        }
        if !self.state.can_transition_to(next) {
            warn!(from = %self.state, to = %next, "illegal connection transition ignored");
            return None;
        }
        debug!(from = %self.state, to = %next, "connection state changed");
        self.state = next;
        Some(ConnectionNotice::State(next))
    }
}

/// Body of the per-connection task: handshake, then pump frames both ways
/// until either side goes away.
async fn run_connection(
    generation: u64,
    handshake: BoxFuture<'static, Result<Link, ChatError>>,
    endpoint: String,
    handshake_timeout: Duration,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let emit = |kind: TransportEventKind| {
        let _ = events.send(TransportEvent { generation, kind });
    };

    let link = match tokio::time::timeout(handshake_timeout, handshake).await {
        Ok(Ok(link)) => link,
        Ok(Err(e)) => return emit(TransportEventKind::Failed(e)),
        Err(_) => {
            return emit(TransportEventKind::Failed(ChatError::HandshakeTimedOut {
                endpoint,
                secs: handshake_timeout.as_secs(),
            }))
        }
    };
    emit(TransportEventKind::Opened);

    let Link { mut sink, mut stream } = link;
    loop {
        tokio::select! {
            out = outbound.recv() => match out {
                Some(frame) => {
                    if let Err(e) = sink.send(frame).await {
                        return emit(TransportEventKind::Failed(e));
                    }
                }
                None => {
                    // Manager released the handle: local close.
                    let _ = sink.close().await;
                    return;
                }
            },
            inbound = stream.next() => match inbound {
                Some(Ok(frame)) => emit(TransportEventKind::Frame(frame)),
                Some(Err(e)) => return emit(TransportEventKind::Failed(e)),
                None => return emit(TransportEventKind::Closed),
            },
        }
    }
}
