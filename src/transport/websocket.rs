use std::future;

use futures_util::future::BoxFuture;
use futures_util::{FutureExt, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, info};
use url::Url;

use crate::errors::ChatError;
use crate::transport::{Link, RawFrame, Transport};

/// WebSocket transport over `tokio-tungstenite`. Text and binary frames are
/// delivered; ping/pong is answered by tungstenite itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WebSocketTransport {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<Link, ChatError>> {
        let url = url.to_string();
        async move {
            let (ws_stream, response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| ChatError::handshake(url.as_str(), e))?;
            info!(status = %response.status(), "WebSocket handshake complete");

            let (write, read) = ws_stream.split();

            let sink = write
                .sink_map_err(transport_fault)
                .with(|text: String| future::ready(Ok::<_, ChatError>(Message::Text(text.into()))));

            let stream = read.filter_map(|msg| {
                future::ready(match msg {
                    Ok(Message::Text(text)) => Some(Ok(RawFrame::Text(text.as_str().to_owned()))),
                    Ok(Message::Binary(data)) => Some(Ok(RawFrame::Binary(data.to_vec()))),
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "server sent close frame");
                        None
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(transport_fault(e))),
                })
            });

            Ok(Link {
                sink: Box::pin(sink),
                stream: stream.boxed(),
            })
        }
        .boxed()
    }
}

fn transport_fault(err: tungstenite::Error) -> ChatError {
    match err {
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            ChatError::TransportClosed
        }
        other => ChatError::TransportFault(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_errors_map_to_transport_closed() {
        assert!(matches!(
            transport_fault(tungstenite::Error::ConnectionClosed),
            ChatError::TransportClosed
        ));
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(
            transport_fault(tungstenite::Error::Io(io)),
            ChatError::TransportFault(_)
        ));
    }

    #[tokio::test]
    async fn refused_handshake_is_handshake_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let url = Url::parse(&format!("ws://{addr}/ws/chat")).unwrap();
        let err = match WebSocketTransport::new().connect(&url).await {
            Ok(_) => panic!("connected to a closed port"),
            Err(e) => e,
        };
        assert!(matches!(err, ChatError::HandshakeFailed { .. }));
        assert!(err.is_transport());
    }
}
