pub mod chat_client;
pub mod dispatcher;

pub use chat_client::{ChatClient, ClientUpdate};
pub use dispatcher::OutboundDispatcher;
