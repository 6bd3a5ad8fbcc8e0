//! Error Types
//!
//! One enum per failing collaborator: auth, table queries, the realtime
//! channel and local configuration. `ItemError` is what list operations
//! report back to their caller after the failure has already been surfaced
//! as a notification.

use thiserror::Error;

use crate::domain::ItemId;

/// Failures of the hosted auth service
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("Email not confirmed")]
    EmailNotConfirmed,

    #[error("Not signed in")]
    NoSession,

    #[error("{0}")]
    Unavailable(String),

    /// Any other rejection, with the service's message
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Remote service is not configured")]
    NotConfigured,
}

/// Failures of reads and writes against the items table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request failed ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Not signed in")]
    NotSignedIn,
}

/// Failures of the change-notification channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Could not connect: {0}")]
    Connect(String),

    #[error("Channel join rejected: {0}")]
    Join(String),

    #[error("Channel closed: {0}")]
    Closed(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),

    #[error("Missing {0}")]
    Missing(&'static str),
}

/// Outcome of a rejected list operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("Todo text is empty")]
    EmptyText,

    #[error("Todo {0} is not in the list")]
    UnknownItem(ItemId),

    #[error("No user is attached to the list")]
    NotAttached,

    #[error(transparent)]
    Remote(#[from] QueryError),
}
