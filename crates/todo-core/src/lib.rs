//! Core of the realtime to-do client.
//!
//! - domain: items, change events, sessions, notifications
//! - reconcile: the local list and how remote changes fold into it
//! - remote: hosted-service clients (auth, table REST, realtime channel)
//! - session: current session, persisted and refreshed
//! - gate: which view to show
//! - config / error: connection settings and error types

pub mod config;
pub mod domain;
pub mod error;
pub mod gate;
pub mod reconcile;
pub mod remote;
pub mod session;

pub use config::RemoteConfig;
pub use error::{AuthError, ChannelError, ConfigError, ItemError, QueryError};
pub use gate::Route;
pub use reconcile::{ListSnapshot, Presenter, Reconciler, ReconcilerOptions};
pub use session::{SessionManager, SessionStore};
