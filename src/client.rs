//! The `WrangleBot` client: one value that owns the session, the socket
//! connection, the subscription router and the REST façade.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::{
    config::Config,
    connection::{ConnectOptions, ConnectionManager, ConnectionState, ConnectionStatus},
    envelope::{Address, Envelope},
    error::{Error, Result},
    event::ClientEvent,
    facade::{LogEntry, RequestFacade},
    query::{encode_segment, Query},
    router::SubscriptionRouter,
    session::Session,
    store::{CredentialStore, FileStore, TOKEN_KEY},
    transport::{SocketIoTransport, Transport},
    user::{User, UserUpdate},
};

/// Client for a WrangleBot server.
pub struct WrangleBot {
    session: Arc<Session>,
    store: Arc<dyn CredentialStore>,
    router: Arc<SubscriptionRouter>,
    connection: ConnectionManager,
    api: Arc<RequestFacade>,
    event_sender: broadcast::Sender<ClientEvent>,
}

impl WrangleBot {
    /// Creates a client that stores its token on disk and talks Socket.IO.
    pub fn new(config: Config) -> Result<Self> {
        let store = Arc::new(FileStore::default_location()?);
        Self::with_backends(config, store, Arc::new(SocketIoTransport))
    }

    /// Creates a client with explicit credential storage and transport.
    pub fn with_backends(
        config: Config,
        store: Arc<dyn CredentialStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self> {
        let session = Arc::new(Session::with_token(config.token.clone()));
        let router = Arc::new(SubscriptionRouter::new());
        let api = Arc::new(RequestFacade::new(&config, session.clone())?);
        let (tx, _) = broadcast::channel(100);
        let connection = ConnectionManager::new(
            config,
            transport,
            store.clone(),
            session.clone(),
            router.clone(),
            tx.clone(),
        );
        Ok(Self {
            session,
            store,
            router,
            connection,
            api,
            event_sender: tx,
        })
    }

    /// Registers a listener for client events.
    pub fn on(&self, callback: impl Fn(ClientEvent) + Send + Sync + 'static) {
        let mut rx = self.event_sender.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => callback(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "Event listener lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    /// A fresh receiver of client events.
    pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
        self.event_sender.subscribe()
    }

    /// Trades a username and password for a token via `POST /login`.
    ///
    /// The token is kept for REST calls, persisted for later `connect()`
    /// calls, and returned. The response body becomes the session identity.
    pub async fn sign_in(&self, username: &str, password: &str) -> Result<String> {
        info!(%username, "Signing in");
        let body = self
            .api
            .post(
                "/login",
                Some(json!({ "username": username, "password": password })),
            )
            .await?;

        let token = body
            .get("token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| Error::Validation("login response carries no token".into()))?
            .to_string();
        let user = User::from_value(&body)?;

        self.store.set(TOKEN_KEY, &token).await?;
        self.session.set_token(Some(token.clone())).await;
        self.session.set_user(Some(user)).await;
        Ok(token)
    }

    /// Forgets the stored token and identity and closes the socket.
    pub async fn sign_out(&self) -> Result<bool> {
        info!("Signing out");
        self.store.remove(TOKEN_KEY).await?;
        self.connection.close().await;
        self.session.clear().await;
        Ok(true)
    }

    /// Saves profile changes of the signed-in user with `PUT /users/<username>`
    /// and merges them into the local identity.
    pub async fn save_user(&self, update: UserUpdate) -> Result<Value> {
        let user = self
            .session
            .user()
            .await
            .ok_or_else(|| Error::Validation("no user is signed in".into()))?;
        let body = json!({
            "firstName": update.first_name,
            "lastName": update.last_name,
            "email": update.email,
            "password": update.password,
        });
        let response = self
            .api
            .put(&format!("/users/{}", encode_segment(user.username())), body)
            .await?;
        self.session.update_user(update).await;
        Ok(response)
    }

    /// See [`ConnectionManager::connect`].
    pub async fn connect(&self, options: ConnectOptions) -> Result<()> {
        self.connection.connect(options).await
    }

    /// Closes the socket; the stored token is kept.
    pub async fn disconnect(&self) {
        self.connection.close().await;
    }

    pub async fn hook<F>(&self, event: &str, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.connection.hook(event, callback).await;
    }

    pub async fn hook_once<F>(&self, event: &str, callback: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.connection.hook_once(event, callback).await;
    }

    pub async fn unhook(&self, event: &str) {
        self.connection.unhook(event).await;
    }

    pub async fn send(&self, address: Address, event: &str, data: Value) -> Result<()> {
        self.connection.send(address, event, data).await
    }

    pub async fn status(&self) -> ConnectionStatus {
        self.connection.status().await
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.connection.state_receiver()
    }

    /// Calls `callback` with the `data` of every push for `(event, id)`.
    ///
    /// The subscription is announced to the server right away when the
    /// connection is `Ready`, and again after every successful handshake.
    pub async fn subscribe<F>(&self, event: &str, id: &str, callback: F) -> Result<()>
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.router.add(event, id, Arc::new(callback)).await;
        if self.connection.state() == ConnectionState::Ready {
            self.announce("subscribe", event, id).await?;
        }
        Ok(())
    }

    /// Stops delivery for `(event, id)`. Unknown pairs are ignored.
    ///
    /// The server is only told while `Ready`; a later handshake announces
    /// the remaining subscriptions only.
    pub async fn unsubscribe(&self, event: &str, id: &str) -> Result<()> {
        if self.router.remove(event, id).await == 0 {
            debug!(%event, %id, "Nothing to unsubscribe");
            return Ok(());
        }
        if self.connection.state() == ConnectionState::Ready {
            self.announce("unsubscribe", event, id).await?;
        }
        Ok(())
    }

    async fn announce(&self, kind: &str, event: &str, id: &str) -> Result<()> {
        let envelope = Envelope::broadcast(json!({ "event": event, "id": id }));
        self.connection.emit(kind, &envelope).await
    }

    pub async fn user(&self) -> Option<User> {
        self.session.user().await
    }

    pub async fn token(&self) -> Option<String> {
        self.session.token().await
    }

    /// Snapshot of the REST request log.
    pub async fn logs(&self) -> Vec<LogEntry> {
        self.api.logs().await
    }

    /// Fluent access to the REST resources.
    pub fn query(&self) -> Query {
        Query::new(self.api.clone())
    }

    pub fn api(&self) -> &RequestFacade {
        &self.api
    }
}
