//! Remote Service Layer
//!
//! Abstract interfaces for the hosted backend and their implementations:
//! - http: shared request plumbing and error-body decoding
//! - auth: password auth, sessions, verification emails
//! - rest: reads and writes against the items table
//! - realtime: the change-notification channel
//! - memory: an in-process stand-in used by tests

pub mod http;
pub mod auth;
pub mod rest;
pub mod realtime;
pub mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{ChangeEvent, Item, ItemId, ItemKey, NewItem, Session, SignUpOutcome, User, UserId};
use crate::error::{AuthError, ChannelError, QueryError};

pub use auth::GoTrueClient;
pub use http::SupabaseHttp;
pub use memory::MemoryBackend;
pub use realtime::RealtimeFeed;
pub use rest::RestItemRepository;

// ========================
// Items table
// ========================

/// Row access for the items table, always scoped by owner or id
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// All items of `owner`, ascending by id
    async fn list_by_owner(&self, owner: &UserId) -> Result<Vec<Item>, QueryError>;

    /// Insert one row, returning it with its assigned id
    async fn insert(&self, item: &NewItem) -> Result<Item, QueryError>;

    /// Set `completed` on one row; `None` if no row matched
    async fn set_completed(&self, id: ItemId, completed: bool) -> Result<Option<Item>, QueryError>;

    /// Delete one row; `None` if no row matched
    async fn delete(&self, id: ItemId) -> Result<Option<ItemKey>, QueryError>;
}

/// Supplies the bearer token for table requests and the change feed.
///
/// Implementations refresh a token that is about to expire before handing it
/// out; `None` means nobody is signed in (any more).
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn access_token(&self) -> Option<String>;
}

// ========================
// Change feed
// ========================

/// What a subscription delivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    Change(ChangeEvent),
    /// The channel went away; no further events follow
    Lost(ChannelError),
}

/// Closes a subscription. Closing happens at most once, on `close` or on drop.
pub struct SubscriptionHandle {
    closer: Option<Box<dyn FnOnce() + Send>>,
}

impl SubscriptionHandle {
    pub fn new(closer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            closer: Some(Box::new(closer)),
        }
    }

    /// Returns true if this call performed the close
    pub fn close(&mut self) -> bool {
        match self.closer.take() {
            Some(closer) => {
                closer();
                true
            }
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_none()
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// An open subscription: the event stream plus the handle that ends it
#[derive(Debug)]
pub struct Subscription {
    pub events: mpsc::UnboundedReceiver<FeedEvent>,
    pub handle: SubscriptionHandle,
}

/// Standing channel of change notifications for the items table
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, owner: &UserId, access_token: &str) -> Result<Subscription, ChannelError>;
}

// ========================
// Auth
// ========================

/// Password auth against the hosted service
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    async fn get_user(&self, access_token: &str) -> Result<User, AuthError>;

    async fn resend_verification(&self, email: &str) -> Result<(), AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_handle_closes_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let mut handle = SubscriptionHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handle.close());
        assert!(!handle.close());
        drop(handle);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_closes() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        drop(SubscriptionHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
