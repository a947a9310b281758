//! Client side of the Dr. Max streaming chat channel.
//!
//! A [`ChatClient`] owns one connection to the chat endpoint, decodes the
//! frames that arrive on it, assembles streamed replies and keeps the session
//! log that a UI renders. Drive it by awaiting [`ChatClient::next_update`] in a
//! loop and calling its action methods in between.

pub mod config;
pub mod errors;
pub mod models;
pub mod protocol;
pub mod service;
pub mod session;
pub mod transport;

pub use config::ClientConfig;
pub use errors::ChatError;
pub use models::{ConnectionState, MessageRecord, Sender, SessionParams};
pub use service::{ChatClient, ClientUpdate};
pub use transport::WebSocketTransport;
