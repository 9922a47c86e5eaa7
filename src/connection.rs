//! # Connection manager
//!
//! Owns the socket and runs the connect/handshake/reconnect state machine:
//!
//! ```text
//! Disconnected ──connect()──► Connecting ──transport up──► AwaitingHandshake
//!      ▲                                                          │
//!      │            transport lost / handshake rejected           │ token reply, status 200
//!      └──────────────────────────── Ready ◄──────────────────────┘
//! ```
//!
//! The transport reconnects on its own; each time it comes back the manager
//! re-sends `auth` with the current token and returns to `Ready` when the
//! server accepts it. Inbound `subscription` pushes reach the router only
//! while `Ready`. Raw hooks see every named inbound event regardless of state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{broadcast, mpsc, oneshot, watch, Mutex};
use tracing::{debug, info, warn};

use crate::{
    config::Config,
    envelope::{Address, Envelope},
    error::{Error, Result},
    event::{ClientEvent, Inbound, Reply},
    router::SubscriptionRouter,
    session::Session,
    store::{CredentialStore, TOKEN_KEY},
    transport::{Link, Socket, Transport, TransportEvent},
    user::User,
};

/// Lifecycle of the authenticated connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    /// Transport opened, waiting for it to come up.
    Connecting,
    /// `auth` sent, waiting for the `token` reply.
    AwaitingHandshake,
    Ready,
}

/// Read-only view of the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    pub connected: bool,
}

/// Options for [`ConnectionManager::connect`].
#[derive(Clone, Debug, Default)]
pub struct ConnectOptions {
    /// Token to authenticate with; persisted before connecting. When absent
    /// the stored token is used.
    pub token: Option<String>,
}

impl ConnectOptions {
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }
}

/// Raw listener for a named socket event.
pub type Hook = Arc<dyn Fn(&Value) + Send + Sync>;

struct HookEntry {
    callback: Hook,
    once: bool,
}

#[derive(Default)]
struct Hooks {
    entries: Mutex<HashMap<String, Vec<HookEntry>>>,
}

impl Hooks {
    async fn add(&self, event: &str, callback: Hook, once: bool) {
        self.entries
            .lock()
            .await
            .entry(event.to_string())
            .or_default()
            .push(HookEntry { callback, once });
    }

    async fn remove(&self, event: &str) {
        self.entries.lock().await.remove(event);
    }

    async fn fire(&self, event: &str, payload: &Value) -> usize {
        let callbacks: Vec<Hook> = {
            let mut entries = self.entries.lock().await;
            let Some(list) = entries.get_mut(event) else {
                return 0;
            };
            let callbacks = list.iter().map(|entry| entry.callback.clone()).collect();
            list.retain(|entry| !entry.once);
            if list.is_empty() {
                entries.remove(event);
            }
            callbacks
        };
        for callback in &callbacks {
            callback(payload);
        }
        callbacks.len()
    }
}

struct ConnectionInner {
    config: Config,
    transport: Arc<dyn Transport>,
    store: Arc<dyn CredentialStore>,
    session: Arc<Session>,
    router: Arc<SubscriptionRouter>,
    events: broadcast::Sender<ClientEvent>,
    state: watch::Sender<ConnectionState>,
    socket: Mutex<Option<Socket>>,
    hooks: Hooks,
    waiters: Mutex<Vec<oneshot::Sender<Result<()>>>>,
    /// Bumped whenever a link is opened or closed; stale drivers compare against it.
    generation: AtomicU64,
    /// Whether the current link has completed a handshake before.
    established: AtomicBool,
}

/// Manages the single socket of a client. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ConnectionInner>,
}

impl ConnectionManager {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        store: Arc<dyn CredentialStore>,
        session: Arc<Session>,
        router: Arc<SubscriptionRouter>,
        events: broadcast::Sender<ClientEvent>,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ConnectionInner {
                config,
                transport,
                store,
                session,
                router,
                events,
                state,
                socket: Mutex::new(None),
                hooks: Hooks::default(),
                waiters: Mutex::new(Vec::new()),
                generation: AtomicU64::new(0),
                established: AtomicBool::new(false),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Whether the transport is currently up, regardless of the handshake.
    pub async fn status(&self) -> ConnectionStatus {
        let connected = self
            .inner
            .socket
            .lock()
            .await
            .as_ref()
            .is_some_and(Socket::is_connected);
        ConnectionStatus { connected }
    }

    /// Opens the socket and authenticates over it.
    ///
    /// Resolves immediately when already `Ready`. Otherwise the token comes
    /// from `options` (and is persisted) or from the credential store; with
    /// neither, fails with [`Error::NoCredential`] before opening anything.
    ///
    /// Fails with [`Error::Timeout`] when no handshake succeeds within
    /// `Config::timeout`. The transport keeps reconnecting after a timeout,
    /// so a timed-out client can still become `Ready` later on its own; that
    /// late success fills in the session identity and emits
    /// [`ClientEvent::Connected`], but never resolves the call that timed out.
    pub async fn connect(&self, options: ConnectOptions) -> Result<()> {
        if self.state() == ConnectionState::Ready {
            debug!("Already connected");
            return Ok(());
        }

        let token = self.resolve_token(options.token).await?;
        self.inner.session.set_token(Some(token)).await;

        let (tx, rx) = oneshot::channel();
        {
            let mut waiters = self.inner.waiters.lock().await;
            waiters.retain(|waiter| !waiter.is_closed());
            waiters.push(tx);
        }
        if self.state() == ConnectionState::Ready {
            return Ok(());
        }
        self.ensure_open().await?;

        let deadline = self.inner.config.timeout;
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(Error::Closed),
            Err(_) => {
                self.inner
                    .waiters
                    .lock()
                    .await
                    .retain(|waiter| !waiter.is_closed());
                let after = u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX);
                warn!(after_ms = after, "Handshake timed out; transport keeps retrying");
                Err(Error::Timeout(after))
            }
        }
    }

    /// Closes the socket and stops reconnecting. Pending `connect()` calls fail
    /// with [`Error::Closed`].
    pub async fn close(&self) {
        let socket = self.inner.socket.lock().await.take();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(socket) = socket {
            info!("Closing socket");
            socket.close();
        }
        let was = self.inner.state.send_replace(ConnectionState::Disconnected);
        self.inner.session.set_user(None).await;
        self.inner.settle(|| Err(Error::Closed)).await;
        if was != ConnectionState::Disconnected {
            self.inner.emit(ClientEvent::Disconnected);
        }
    }

    /// Registers a raw listener for `event` on the socket.
    pub async fn hook<F>(&self, event: &str, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.hooks.add(event, Arc::new(callback), false).await;
    }

    /// Like [`hook`](Self::hook), but the listener is dropped after its first call.
    pub async fn hook_once<F>(&self, event: &str, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.hooks.add(event, Arc::new(callback), true).await;
    }

    /// Removes every raw listener for `event`.
    pub async fn unhook(&self, event: &str) {
        self.inner.hooks.remove(event).await;
    }

    /// Wraps `data` in an envelope for `address` and emits it as `event`.
    pub async fn send(&self, address: Address, event: &str, data: Value) -> Result<()> {
        self.emit(event, &Envelope::new(address, data)).await
    }

    /// Emits a prepared envelope as `event`. Fails with
    /// [`Error::NotConnected`] when no socket was ever opened; while the
    /// transport is reconnecting the frame is queued instead.
    pub async fn emit(&self, event: &str, envelope: &Envelope) -> Result<()> {
        let socket = self.inner.current_socket().await.ok_or(Error::NotConnected)?;
        socket.emit(event, envelope.to_value())
    }

    async fn resolve_token(&self, explicit: Option<String>) -> Result<String> {
        match explicit {
            Some(token) => {
                debug!("Connecting with explicit token");
                self.inner.store.set(TOKEN_KEY, &token).await?;
                Ok(token)
            }
            None => {
                debug!("No token provided, loading from credential store");
                self.inner
                    .store
                    .get(TOKEN_KEY)
                    .await?
                    .ok_or(Error::NoCredential)
            }
        }
    }

    /// Opens a link unless one is already open; re-sends `auth` on a live one.
    async fn ensure_open(&self) -> Result<()> {
        let mut slot = self.inner.socket.lock().await;
        let existing = slot.as_ref().filter(|socket| !socket.is_closed()).cloned();
        if let Some(socket) = existing {
            drop(slot);
            if socket.is_connected() {
                self.inner.begin_handshake(&socket).await;
            }
            return Ok(());
        }

        let url = self.inner.config.resolve_socket_url()?;
        let Link { socket, events } = self
            .inner
            .transport
            .open(&url, &self.inner.config.reconnect)?;
        info!(url = %url, "Opening socket");

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.established.store(false, Ordering::SeqCst);
        self.inner.state.send_replace(ConnectionState::Connecting);
        *slot = Some(socket);
        drop(slot);

        tokio::spawn(drive(self.inner.clone(), generation, events));
        Ok(())
    }
}

/// Processes one link's transport events in order.
async fn drive(
    inner: Arc<ConnectionInner>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = events.recv().await {
        if !inner.is_current(generation) {
            break;
        }
        match event {
            TransportEvent::Connected => inner.on_transport_up().await,
            TransportEvent::Message { event, payload } => {
                inner.hooks.fire(&event, &payload).await;
                inner.on_inbound(Inbound::classify(&event, payload)).await;
            }
            TransportEvent::Disconnected { reason } => inner.on_transport_down(&reason).await,
        }
    }
    debug!(generation, "Socket driver exiting");
}

impl ConnectionInner {
    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn emit(&self, event: ClientEvent) {
        debug!(%event, "Emitting event");
        let _ = self.events.send(event);
    }

    async fn current_socket(&self) -> Option<Socket> {
        self.socket.lock().await.clone()
    }

    /// Resolves every pending `connect()` with a fresh result.
    async fn settle<F>(&self, result: F)
    where
        F: Fn() -> Result<()>,
    {
        let waiters = std::mem::take(&mut *self.waiters.lock().await);
        for waiter in waiters {
            let _ = waiter.send(result());
        }
    }

    async fn begin_handshake(&self, socket: &Socket) {
        let Some(token) = self.session.token().await else {
            warn!("Transport is up but there is no token to authenticate with");
            return;
        };
        self.state.send_replace(ConnectionState::AwaitingHandshake);
        let envelope = Envelope::broadcast(json!({ "token": token }));
        match socket.emit("auth", envelope.to_value()) {
            Ok(()) => debug!("Handshake sent"),
            Err(e) => warn!(error = %e, "Could not send handshake"),
        }
    }

    async fn on_transport_up(&self) {
        info!("Transport connected");
        if let Some(socket) = self.current_socket().await {
            self.begin_handshake(&socket).await;
        }
    }

    async fn on_transport_down(&self, reason: &str) {
        info!(%reason, "Transport disconnected");
        let was = self.state.send_replace(ConnectionState::Disconnected);
        self.session.set_user(None).await;
        self.hooks.fire("disconnect", &Value::Null).await;
        if was != ConnectionState::Disconnected {
            self.emit(ClientEvent::Disconnected);
        }
    }

    async fn on_inbound(&self, inbound: Inbound) {
        match inbound {
            Inbound::Connected => {
                if self.state() == ConnectionState::Connecting {
                    self.on_transport_up().await;
                }
            }
            Inbound::Token(reply) => self.on_handshake_reply(reply).await,
            Inbound::Subscription(reply) => {
                if self.state() == ConnectionState::Ready {
                    let delivered = self.router.deliver(&reply).await;
                    debug!(delivered, "Relayed subscription push");
                    self.emit(ClientEvent::Subscription(reply));
                } else {
                    debug!(state = ?self.state(), "Dropping subscription push before handshake");
                }
            }
            Inbound::Unknown { event, payload } => {
                debug!(%event, "Unhandled inbound event");
                self.emit(ClientEvent::Unhandled { event, payload });
            }
        }
    }

    async fn on_handshake_reply(&self, reply: Reply) {
        if !reply.is_success() {
            warn!(status = reply.status, "Handshake rejected");
            self.state.send_replace(ConnectionState::Disconnected);
            self.emit(ClientEvent::HandshakeRejected(reply.clone()));
            self.settle(|| Err(Error::Handshake(reply.clone()))).await;
            return;
        }

        let user = match User::from_value(&reply.data) {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Handshake reply carries no usable identity");
                let missing = matches!(e, Error::MissingUsername);
                let detail = e.to_string();
                self.state.send_replace(ConnectionState::Disconnected);
                self.settle(|| {
                    Err(if missing {
                        Error::MissingUsername
                    } else {
                        Error::Validation(format!("invalid identity in handshake: {detail}"))
                    })
                })
                .await;
                return;
            }
        };

        if let Some(token) = reply.data.get("token").and_then(Value::as_str) {
            self.session.set_token(Some(token.to_string())).await;
        }
        let username = user.username().to_string();
        self.session.set_user(Some(user)).await;
        self.state.send_replace(ConnectionState::Ready);
        info!(%username, "Handshake accepted");

        self.announce_subscriptions().await;
        let reconnected = self.established.swap(true, Ordering::SeqCst);
        self.emit(if reconnected {
            ClientEvent::Reconnected { username }
        } else {
            ClientEvent::Connected { username }
        });
        self.settle(|| Ok(())).await;
    }

    /// Re-sends `subscribe` for every registered pair so the server resumes pushing.
    async fn announce_subscriptions(&self) {
        let Some(socket) = self.current_socket().await else {
            return;
        };
        for (event, id) in self.router.topics().await {
            let envelope = Envelope::broadcast(json!({ "event": event, "id": id }));
            if let Err(e) = socket.emit("subscribe", envelope.to_value()) {
                warn!(error = %e, %event, %id, "Could not announce subscription");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconnectConfig;
    use crate::store::MemoryStore;
    use crate::transport::{link, Peer};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use url::Url;

    #[derive(Default)]
    struct SilentTransport {
        peers: std::sync::Mutex<Vec<Peer>>,
    }

    impl Transport for SilentTransport {
        fn open(&self, _url: &Url, _reconnect: &ReconnectConfig) -> Result<Link> {
            let (link, peer) = link();
            peer.connected();
            self.peers.lock().unwrap().push(peer);
            Ok(link)
        }
    }

    fn manager(timeout: Duration) -> ConnectionManager {
        let (events, _) = broadcast::channel(16);
        ConnectionManager::new(
            Config::default().timeout(timeout),
            Arc::new(SilentTransport::default()),
            Arc::new(MemoryStore::new()),
            Arc::new(Session::default()),
            Arc::new(SubscriptionRouter::new()),
            events,
        )
    }

    #[tokio::test]
    async fn timed_out_connects_leave_no_waiters_behind() {
        let manager = manager(Duration::from_millis(10));
        for _ in 0..3 {
            let result = manager.connect(ConnectOptions::with_token("t")).await;
            assert!(matches!(result, Err(Error::Timeout(10))));
        }
        assert!(manager.inner.waiters.lock().await.is_empty());
        assert_eq!(manager.state(), ConnectionState::AwaitingHandshake);
    }

    #[tokio::test]
    async fn hooks_fire_until_unhooked() {
        let hooks = Hooks::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        hooks
            .add(
                "progress",
                Arc::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
                false,
            )
            .await;

        assert_eq!(hooks.fire("progress", &Value::Null).await, 1);
        assert_eq!(hooks.fire("progress", &Value::Null).await, 1);
        assert_eq!(hooks.fire("other", &Value::Null).await, 0);

        hooks.remove("progress").await;
        assert_eq!(hooks.fire("progress", &Value::Null).await, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn once_hooks_fire_a_single_time() {
        let hooks = Hooks::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        hooks
            .add(
                "token",
                Arc::new(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
                true,
            )
            .await;

        hooks.fire("token", &json!({"status": 200})).await;
        hooks.fire("token", &json!({"status": 200})).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn connect_options_carry_token() {
        assert_eq!(ConnectOptions::with_token("abc").token.as_deref(), Some("abc"));
        assert!(ConnectOptions::default().token.is_none());
    }
}
