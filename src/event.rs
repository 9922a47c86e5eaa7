//! Event definitions for the WrangleBot client.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The status code the server uses for a successful reply.
pub const STATUS_OK: u16 = 200;

/// The `{status, data}` payload convention used by every server-pushed event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub status: u16,
    #[serde(default)]
    pub data: Value,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// A named frame received from the socket, classified by event name.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    /// Server-side "connected" signal; triggers the handshake.
    Connected,
    /// Handshake response to an outbound `auth`.
    Token(Reply),
    /// Push for an active subscription.
    Subscription(Reply),
    /// Anything else, or a known event whose payload did not parse.
    Unknown { event: String, payload: Value },
}

impl Inbound {
    pub fn classify(event: &str, payload: Value) -> Self {
        match event {
            "connected" => Inbound::Connected,
            "token" | "subscription" => match serde_json::from_value::<Reply>(payload.clone()) {
                Ok(reply) if event == "token" => Inbound::Token(reply),
                Ok(reply) => Inbound::Subscription(reply),
                Err(_) => Inbound::Unknown {
                    event: event.to_string(),
                    payload,
                },
            },
            _ => Inbound::Unknown {
                event: event.to_string(),
                payload,
            },
        }
    }
}

/// Enumeration of local notifications emitted by the client.
#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    /// The first successful handshake on a transport.
    Connected { username: String },
    /// A successful handshake after the transport dropped and came back.
    Reconnected { username: String },
    /// The transport was lost.
    Disconnected,
    /// The server refused the handshake.
    HandshakeRejected(Reply),
    /// A `subscription` push relayed after the handshake.
    Subscription(Reply),
    /// An inbound event no component handles.
    Unhandled { event: String, payload: Value },
}

impl fmt::Display for ClientEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientEvent::Connected { username } => write!(f, "Connected as {}", username),
            ClientEvent::Reconnected { username } => write!(f, "Reconnected as {}", username),
            ClientEvent::Disconnected => write!(f, "Disconnected"),
            ClientEvent::HandshakeRejected(reply) => {
                write!(f, "HandshakeRejected {}: {}", reply.status, reply.data)
            }
            ClientEvent::Subscription(reply) => write!(f, "Subscription: {}", reply.data),
            ClientEvent::Unhandled { event, payload } => write!(f, "Unhandled {}: {}", event, payload),
        }
    }
}
