//! # Socket transport
//!
//! The connection manager talks to the server through a [`Link`]: a
//! [`Socket`] for outbound frames plus a stream of [`TransportEvent`]s. The
//! other half of the link, the [`Peer`], is driven by a transport
//! implementation. [`SocketIoTransport`] drives it from a Socket.IO client,
//! which owns the wire protocol and reconnects on its own after a drop.
//!
//! Outbound frames queue in the link while the transport is down and flush
//! once it is back up.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use rand::Rng;
use rust_socketio::asynchronous::{Client, ClientBuilder};
use rust_socketio::{Event, Payload};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ReconnectConfig;
use crate::error::{Error, Result};

/// A named outbound message.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub event: String,
    pub payload: Value,
}

/// Signals a transport delivers to the connection manager.
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    Connected,
    Message { event: String, payload: Value },
    Disconnected { reason: String },
}

/// Opens links to the server. Implementations own reconnection.
pub trait Transport: Send + Sync {
    fn open(&self, url: &Url, reconnect: &ReconnectConfig) -> Result<Link>;
}

/// The manager's half of an open transport.
pub struct Link {
    pub socket: Socket,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Outbound handle of an open transport.
#[derive(Clone, Debug)]
pub struct Socket {
    outbound: mpsc::UnboundedSender<Frame>,
    connected: watch::Receiver<bool>,
    cancel: CancellationToken,
}

impl Socket {
    /// Queues a frame; it is written as soon as the transport is up.
    pub fn emit(&self, event: &str, payload: Value) -> Result<()> {
        self.outbound
            .send(Frame {
                event: event.to_string(),
                payload,
            })
            .map_err(|_| Error::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Stops the transport, including any pending reconnection.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Cloneable sender side of a link's transport events, for protocol callbacks.
///
/// `connected`/`disconnected` only report actual transitions.
#[derive(Clone, Debug)]
pub struct Signals {
    events: mpsc::UnboundedSender<TransportEvent>,
    connected: Arc<watch::Sender<bool>>,
}

impl Signals {
    pub fn connected(&self) {
        if !self.connected.send_replace(true) {
            let _ = self.events.send(TransportEvent::Connected);
        }
    }

    pub fn disconnected(&self, reason: impl Into<String>) {
        if self.connected.send_replace(false) {
            let _ = self.events.send(TransportEvent::Disconnected {
                reason: reason.into(),
            });
        }
    }

    pub fn deliver(&self, event: impl Into<String>, payload: Value) {
        let _ = self.events.send(TransportEvent::Message {
            event: event.into(),
            payload,
        });
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }
}

/// The transport's half of a link.
pub struct Peer {
    signals: Signals,
    outbound: mpsc::UnboundedReceiver<Frame>,
    cancel: CancellationToken,
}

impl Peer {
    /// Marks the transport as up and tells the manager.
    pub fn connected(&self) {
        self.signals.connected();
    }

    /// Marks the transport as down and tells the manager.
    pub fn disconnected(&self, reason: impl Into<String>) {
        self.signals.disconnected(reason);
    }

    /// Hands an inbound named message to the manager.
    pub fn deliver(&self, event: impl Into<String>, payload: Value) {
        self.signals.deliver(event, payload);
    }

    pub fn signals(&self) -> Signals {
        self.signals.clone()
    }

    /// Waits for the next queued outbound frame.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.outbound.recv().await
    }

    /// Returns an outbound frame if one is already queued.
    pub fn try_next_frame(&mut self) -> Option<Frame> {
        self.outbound.try_recv().ok()
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Creates both halves of an in-process link.
pub fn link() -> (Link, Peer) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (connected_tx, connected_rx) = watch::channel(false);
    let cancel = CancellationToken::new();

    let socket = Socket {
        outbound: outbound_tx,
        connected: connected_rx,
        cancel: cancel.clone(),
    };
    let peer = Peer {
        signals: Signals {
            events: events_tx,
            connected: Arc::new(connected_tx),
        },
        outbound: outbound_rx,
        cancel,
    };
    (
        Link {
            socket,
            events: events_rx,
        },
        peer,
    )
}

/// Exponential backoff, randomized by `randomization_factor` and capped at `max_delay`.
pub fn backoff_delay(attempt: u32, config: &ReconnectConfig) -> Duration {
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(31) as i32);
    let factor = config.randomization_factor.clamp(0.0, 1.0);
    let jittered = if factor > 0.0 {
        let deviation = rand::rng().random_range(-factor..=factor);
        base * (1.0 + deviation)
    } else {
        base
    };
    Duration::from_secs_f64(jittered.clamp(0.0, config.max_delay.as_secs_f64()))
}

/// Unpacks the event arguments of a Socket.IO payload: one argument as
/// itself, several as an array, none as `null`.
pub fn payload_value(payload: Payload) -> Value {
    match payload {
        Payload::Text(mut values) => match values.len() {
            0 => Value::Null,
            1 => values.remove(0),
            _ => Value::Array(values),
        },
        _ => Value::Null,
    }
}

/// Socket.IO transport.
///
/// The client library reconnects after a dropped connection using the
/// configured delays. Until the first connection succeeds, dialing is
/// retried here with [`backoff_delay`].
#[derive(Clone, Debug, Default)]
pub struct SocketIoTransport;

impl Transport for SocketIoTransport {
    fn open(&self, url: &Url, reconnect: &ReconnectConfig) -> Result<Link> {
        let (link, peer) = link();
        tokio::spawn(sio_loop(url.clone(), reconnect.clone(), peer));
        Ok(link)
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn builder(url: &Url, reconnect: &ReconnectConfig, signals: Signals) -> ClientBuilder {
    let on_connect = signals.clone();
    let on_close = signals.clone();
    let mut builder = ClientBuilder::new(url.as_str())
        .reconnect(true)
        .reconnect_on_disconnect(true)
        .reconnect_delay(millis(reconnect.initial_delay), millis(reconnect.max_delay))
        .on(Event::Connect, move |_, _| {
            on_connect.connected();
            async {}.boxed()
        })
        .on(Event::Close, move |_, _| {
            on_close.disconnected("closed by server");
            async {}.boxed()
        })
        .on(Event::Error, |payload, _| {
            warn!(error = ?payload, "Socket error");
            async {}.boxed()
        })
        .on_any(move |event, payload, _| {
            let name = match event {
                Event::Custom(name) => Some(name),
                Event::Message => Some("message".to_string()),
                _ => None,
            };
            if let Some(name) = name {
                signals.deliver(name, payload_value(payload));
            }
            async {}.boxed()
        });
    if let Some(max) = reconnect.max_attempts {
        builder = builder.max_reconnect_attempts(u8::try_from(max).unwrap_or(u8::MAX));
    }
    builder
}

/// Dials until the first connection succeeds, the attempt limit is hit or the link is closed.
async fn dial(
    url: &Url,
    reconnect: &ReconnectConfig,
    signals: &Signals,
    cancel: &CancellationToken,
) -> Option<Client> {
    let mut attempt: u32 = 0;
    loop {
        let connecting = builder(url, reconnect, signals.clone()).connect();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            result = connecting => result,
        };
        match result {
            Ok(client) => {
                info!(url = %url, "Socket connected");
                return Some(client);
            }
            Err(e) => warn!(error = %e, attempt, "Socket connection failed"),
        }

        if let Some(max) = reconnect.max_attempts {
            if attempt >= max {
                warn!(max_attempts = max, "Socket connection limit reached, giving up");
                return None;
            }
        }

        let delay = backoff_delay(attempt, reconnect);
        debug!(delay_ms = millis(delay), attempt, "Waiting before next attempt");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }
        attempt = attempt.saturating_add(1);
    }
}

/// dial → forward queued frames while connected → close on cancellation.
async fn sio_loop(url: Url, reconnect: ReconnectConfig, mut peer: Peer) {
    let cancel = peer.cancellation();
    let signals = peer.signals();
    let Some(client) = dial(&url, &reconnect, &signals, &cancel).await else {
        debug!("Socket loop exiting before connecting");
        return;
    };
    signals.connected();

    let mut connected = signals.watch();
    let mut pending: VecDeque<Frame> = VecDeque::new();
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = connected.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            frame = peer.next_frame() => match frame {
                Some(frame) => pending.push_back(frame),
                None => break,
            },
        }
        let up = *connected.borrow();
        if up {
            flush(&client, &mut pending).await;
        }
    }

    if let Err(e) = client.disconnect().await {
        debug!(error = %e, "Socket did not close cleanly");
    }
    signals.disconnected("closed by client");
    debug!("Socket loop exiting");
}

/// Emits queued frames in order; a failed frame stays at the front for the next connection.
async fn flush(client: &Client, pending: &mut VecDeque<Frame>) {
    while let Some(frame) = pending.pop_front() {
        if let Err(e) = client.emit(frame.event.as_str(), frame.payload.clone()).await {
            warn!(error = %e, event = %frame.event, "Emit failed, keeping frame queued");
            pending.push_front(frame);
            return;
        }
    }
}
