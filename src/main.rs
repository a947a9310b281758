use std::collections::HashSet;

use drmax_chat::transport::ReconnectPolicy;
use drmax_chat::{
    ChatClient, ClientConfig, ClientUpdate, ConnectionState, MessageRecord, Sender,
    WebSocketTransport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

/// One line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Say(String),
    NewChat,
    History,
    Reconnect,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        Some(match line {
            "/new" => Command::NewChat,
            "/history" => Command::History,
            "/reconnect" => Command::Reconnect,
            "/quit" | "/exit" => Command::Quit,
            other if other.starts_with('/') => Command::Unknown(other.to_string()),
            other => Command::Say(other.to_string()),
        })
    }
}

/// Prints each sealed record once. Records still streaming wait until sealed.
#[derive(Default)]
struct Transcript {
    shown: HashSet<String>,
}

impl Transcript {
    fn take_new(&mut self, records: &[MessageRecord]) -> Vec<String> {
        records
            .iter()
            .filter(|r| !r.streaming && self.shown.insert(r.id.clone()))
            .map(|r| match r.sender {
                Sender::User => format!("you: {}", r.text),
                Sender::Bot => format!("Dr. Max: {}", r.text),
            })
            .collect()
    }

    fn reset(&mut self) {
        self.shown.clear();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present (development convenience)
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout is the transcript.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drmax_chat=info,drmax=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env()?;
    let policy = config.auto_reconnect.then(ReconnectPolicy::default);
    info!(endpoint = %config.endpoint, room_id = %config.params.room_id, "starting Dr. Max chat");

    let mut client = ChatClient::new(WebSocketTransport::new(), &config);
    client.open()?;

    let mut transcript = Transcript::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut retry_at: Option<Instant> = None;
    let mut faulted = false;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(command) = Command::parse(&line) else { continue };
                match command {
                    Command::Say(text) => {
                        if let Err(e) = client.send(&text) {
                            println!("! {e}");
                            if client.state() == ConnectionState::Disconnected {
                                println!("! type /reconnect to connect again");
                            }
                        }
                    }
                    Command::NewChat => {
                        client.new_session();
                        transcript.reset();
                    }
                    Command::History => {
                        if let Err(e) = client.request_history() {
                            println!("! {e}");
                        }
                    }
                    Command::Reconnect => {
                        retry_at = None;
                        client.open()?;
                    }
                    Command::Quit => break,
                    Command::Unknown(cmd) => {
                        println!("! unknown command {cmd} (try /new, /history, /reconnect, /quit)")
                    }
                }
            }
            update = client.next_update() => match update {
                ClientUpdate::State(state) => {
                    println!("* {state}");
                    match state {
                        ConnectionState::Connected => faulted = false,
                        ConnectionState::Disconnected if faulted => {
                            let delay = policy.and_then(|p| p.delay_for(client.failed_attempts()));
                            retry_at = delay.map(|d| Instant::now() + d);
                            match delay {
                                Some(d) => {
                                    info!(in_ms = d.as_millis() as u64, "reconnect scheduled")
                                }
                                None if policy.is_some() => {
                                    warn!("giving up on reconnecting; type /reconnect")
                                }
                                None => {}
                            }
                        }
                        _ => {}
                    }
                }
                ClientUpdate::LogChanged => {
                    for line in transcript.take_new(client.records()) {
                        println!("{line}");
                    }
                }
                ClientUpdate::ServerError(message) => {
                    println!("! Dr. Max could not answer: {message}")
                }
                ClientUpdate::TransportError(reason) => {
                    faulted = true;
                    println!("! connection lost: {reason}");
                }
            },
            _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                retry_at = None;
                client.open()?;
            }
        }
    }

    client.close("user quit");
    Ok(())
}
