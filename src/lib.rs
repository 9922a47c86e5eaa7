//! # WrangleBot client
//!
//! Async Rust client for a WrangleBot media-management server. It supports:
//!
//! - Sign-in over REST and token persistence (via `sign_in()`)
//! - A reconnecting socket authenticated with an in-band handshake (via `connect()`)
//! - Subscriptions to server pushes keyed by `(event, id)`
//! - A fluent query surface over the REST API (libraries, tasks, metafiles,
//!   transcodes, users, volumes, utilities)
//! - A listener API (`on()`) for connection and subscription events
//!
//! For usage examples, see `demos/simple.rs`.

pub mod client;
pub mod config;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod event;
pub mod facade;
pub mod query;
pub mod router;
pub mod session;
pub mod store;
pub mod transport;
pub mod user;
pub mod utils;

pub use client::WrangleBot;
pub use config::{Config, ReconnectConfig};
pub use connection::{ConnectOptions, ConnectionState, ConnectionStatus};
pub use envelope::{Address, Envelope};
pub use error::{Error, Result};
pub use event::ClientEvent;
pub use user::{User, UserUpdate};
