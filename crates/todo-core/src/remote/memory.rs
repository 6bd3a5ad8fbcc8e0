//! In-Memory Backend
//!
//! A process-local stand-in for the hosted service: item table, change feed
//! and password auth in one object. Used by tests, and handy for running the
//! shell without a project configured.
//!
//! Writes through [`ItemRepository`] are echoed to open subscriptions whose
//! owner matches (like the server-side `user_id=eq.` filter), unless
//! `echo_own_writes` is turned off. `push` delivers an arbitrary event to every
//! subscriber, unfiltered.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, Notify};

use super::{AuthApi, ChangeFeed, FeedEvent, ItemRepository, Subscription, SubscriptionHandle};
use crate::domain::{ChangeEvent, Item, ItemId, ItemKey, NewItem, Session, SignUpOutcome, User, UserId};
use crate::error::{AuthError, ChannelError, QueryError};

const SESSION_TTL_SECS: i64 = 3600;

/// Table operations that can be counted and made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemoryOp {
    List,
    Insert,
    Update,
    Delete,
}

struct Subscriber {
    owner: UserId,
    sender: mpsc::UnboundedSender<FeedEvent>,
}

struct Account {
    password: String,
    user: User,
}

#[derive(Default)]
struct MemoryState {
    rows: BTreeMap<ItemId, Item>,
    next_id: ItemId,
    echo_own_writes: bool,

    subscribers: HashMap<u64, Subscriber>,
    next_subscriber: u64,
    subscribe_tokens: Vec<String>,
    opened: usize,
    closed: usize,

    failures: HashMap<MemoryOp, QueryError>,
    subscribe_failure: Option<ChannelError>,
    calls: HashMap<MemoryOp, usize>,
    list_hold: Option<Arc<Notify>>,

    accounts: HashMap<String, Account>,
    auto_confirm: bool,
    sessions: HashMap<String, UserId>,
    refresh_tokens: HashMap<String, UserId>,
    next_token: u64,
    session_ttl: i64,
    resent: Vec<String>,
}

impl MemoryState {
    fn broadcast(&mut self, owner: &UserId, event: ChangeEvent) {
        if !self.echo_own_writes {
            return;
        }
        self.subscribers
            .values()
            .filter(|sub| &sub.owner == owner)
            .for_each(|sub| {
                let _ = sub.sender.send(FeedEvent::Change(event.clone()));
            });
    }

    fn record(&mut self, op: MemoryOp) -> Result<(), QueryError> {
        *self.calls.entry(op).or_default() += 1;
        match self.failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn user_by_id(&self, id: &UserId) -> Option<&User> {
        self.accounts.values().map(|a| &a.user).find(|u| &u.id == id)
    }

    fn issue_session(&mut self, user: User) -> Session {
        self.next_token += 1;
        let access_token = format!("access-{}", self.next_token);
        let refresh_token = format!("refresh-{}", self.next_token);
        self.sessions.insert(access_token.clone(), user.id.clone());
        self.refresh_tokens.insert(refresh_token.clone(), user.id.clone());
        Session {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
            expires_at: chrono::Utc::now().timestamp() + self.session_ttl,
            user,
        }
    }
}

#[derive(Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        let state = MemoryState {
            next_id: 1,
            echo_own_writes: true,
            session_ttl: SESSION_TTL_SECS,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================
    // Test controls
    // ========================

    /// Put a row into the table directly, without notifying anyone
    pub fn seed(&self, owner: &UserId, text: &str, completed: bool) -> Item {
        let mut state = self.lock();
        let id = state.next_id;
        state.next_id += 1;
        let item = Item {
            id,
            owner: owner.clone(),
            text: text.to_string(),
            completed,
        };
        state.rows.insert(id, item.clone());
        item
    }

    pub fn rows(&self) -> Vec<Item> {
        self.lock().rows.values().cloned().collect()
    }

    pub fn set_echo_own_writes(&self, echo: bool) {
        self.lock().echo_own_writes = echo;
    }

    pub fn fail(&self, op: MemoryOp, error: QueryError) {
        self.lock().failures.insert(op, error);
    }

    pub fn fail_subscribe(&self, error: ChannelError) {
        self.lock().subscribe_failure = Some(error);
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failures.clear();
        state.subscribe_failure = None;
    }

    pub fn calls(&self, op: MemoryOp) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Make `list_by_owner` wait until the returned gate is notified
    pub fn hold_list(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.lock().list_hold = Some(gate.clone());
        gate
    }

    /// Deliver an event to every open subscription, regardless of owner
    pub fn push(&self, event: ChangeEvent) {
        self.lock().subscribers.values().for_each(|sub| {
            let _ = sub.sender.send(FeedEvent::Change(event.clone()));
        });
    }

    /// Drop every open subscription as if the socket died
    pub fn disconnect(&self, reason: &str) {
        let mut state = self.lock();
        for (_, sub) in state.subscribers.drain() {
            let _ = sub.sender.send(FeedEvent::Lost(ChannelError::Closed(reason.to_string())));
        }
    }

    pub fn subscriptions_opened(&self) -> usize {
        self.lock().opened
    }

    pub fn subscriptions_closed(&self) -> usize {
        self.lock().closed
    }

    pub fn open_subscriptions(&self) -> usize {
        self.lock().subscribers.len()
    }

    /// Access tokens passed to `subscribe`, oldest first
    pub fn subscribe_tokens(&self) -> Vec<String> {
        self.lock().subscribe_tokens.clone()
    }

    /// Lifetime of sessions issued from now on
    pub fn set_session_ttl(&self, secs: i64) {
        self.lock().session_ttl = secs;
    }

    /// Register an account; `confirmed` decides whether it can sign in
    pub fn add_user(&self, email: &str, password: &str, confirmed: bool) -> User {
        let mut state = self.lock();
        let user = User {
            id: UserId::new(format!("user-{}", state.accounts.len() + 1)),
            email: Some(email.to_string()),
            email_confirmed_at: confirmed.then(|| chrono::Utc::now().to_rfc3339()),
        };
        state.accounts.insert(
            email.to_string(),
            Account {
                password: password.to_string(),
                user: user.clone(),
            },
        );
        user
    }

    pub fn confirm(&self, email: &str) {
        if let Some(account) = self.lock().accounts.get_mut(email) {
            account.user.email_confirmed_at = Some(chrono::Utc::now().to_rfc3339());
        }
    }

    /// Sign-ups get a session right away instead of a verification mail
    pub fn set_auto_confirm(&self, auto_confirm: bool) {
        self.lock().auto_confirm = auto_confirm;
    }

    pub fn verification_mails(&self) -> Vec<String> {
        self.lock().resent.clone()
    }

    pub fn is_token_active(&self, access_token: &str) -> bool {
        self.lock().sessions.contains_key(access_token)
    }
}

#[async_trait]
impl ItemRepository for MemoryBackend {
    async fn list_by_owner(&self, owner: &UserId) -> Result<Vec<Item>, QueryError> {
        let hold = {
            let mut state = self.lock();
            state.record(MemoryOp::List)?;
            state.list_hold.take()
        };
        if let Some(gate) = hold {
            gate.notified().await;
        }
        let state = self.lock();
        Ok(state.rows.values().filter(|row| row.is_owned_by(owner)).cloned().collect())
    }

    async fn insert(&self, item: &NewItem) -> Result<Item, QueryError> {
        let mut state = self.lock();
        state.record(MemoryOp::Insert)?;
        let id = state.next_id;
        state.next_id += 1;
        let row = Item {
            id,
            owner: item.owner.clone(),
            text: item.text.clone(),
            completed: item.completed,
        };
        state.rows.insert(id, row.clone());
        state.broadcast(&row.owner, ChangeEvent::Insert { new: row.clone() });
        Ok(row)
    }

    async fn set_completed(&self, id: ItemId, completed: bool) -> Result<Option<Item>, QueryError> {
        let mut state = self.lock();
        state.record(MemoryOp::Update)?;
        let Some(row) = state.rows.get_mut(&id) else {
            return Ok(None);
        };
        row.completed = completed;
        let row = row.clone();
        state.broadcast(&row.owner, ChangeEvent::updated(row.clone()));
        Ok(Some(row))
    }

    async fn delete(&self, id: ItemId) -> Result<Option<ItemKey>, QueryError> {
        let mut state = self.lock();
        state.record(MemoryOp::Delete)?;
        let Some(row) = state.rows.remove(&id) else {
            return Ok(None);
        };
        let key = row.key();
        state.broadcast(&row.owner, ChangeEvent::Delete { old: key.clone() });
        Ok(Some(key))
    }
}

#[async_trait]
impl ChangeFeed for MemoryBackend {
    async fn subscribe(&self, owner: &UserId, access_token: &str) -> Result<Subscription, ChannelError> {
        let mut state = self.lock();
        state.subscribe_tokens.push(access_token.to_string());
        if let Some(err) = state.subscribe_failure.clone() {
            return Err(err);
        }
        let (sender, events) = mpsc::unbounded_channel();
        let key = state.next_subscriber;
        state.next_subscriber += 1;
        state.opened += 1;
        state.subscribers.insert(
            key,
            Subscriber {
                owner: owner.clone(),
                sender,
            },
        );

        let shared = self.state.clone();
        let handle = SubscriptionHandle::new(move || {
            let mut state = shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            state.closed += 1;
            state.subscribers.remove(&key);
        });
        Ok(Subscription { events, handle })
    }
}

#[async_trait]
impl AuthApi for MemoryBackend {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        if self.lock().accounts.contains_key(email) {
            return Err(AuthError::Rejected {
                status: 422,
                message: "User already registered".to_string(),
            });
        }
        let auto_confirm = self.lock().auto_confirm;
        let user = self.add_user(email, password, auto_confirm);
        let mut state = self.lock();
        if auto_confirm {
            Ok(SignUpOutcome::SignedIn {
                session: state.issue_session(user),
            })
        } else {
            state.resent.push(email.to_string());
            Ok(SignUpOutcome::NeedsVerification {
                email: email.to_string(),
            })
        }
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let mut state = self.lock();
        let user = match state.accounts.get(email) {
            Some(account) if account.password == password => account.user.clone(),
            _ => return Err(AuthError::InvalidCredentials),
        };
        if !user.is_confirmed() {
            return Err(AuthError::EmailNotConfirmed);
        }
        Ok(state.issue_session(user))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let mut state = self.lock();
        let user = state
            .refresh_tokens
            .remove(refresh_token)
            .and_then(|id| state.user_by_id(&id).cloned())
            .ok_or_else(|| AuthError::Rejected {
                status: 400,
                message: "Invalid Refresh Token".to_string(),
            })?;
        Ok(state.issue_session(user))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.lock().sessions.remove(access_token);
        Ok(())
    }

    async fn get_user(&self, access_token: &str) -> Result<User, AuthError> {
        let state = self.lock();
        state
            .sessions
            .get(access_token)
            .and_then(|id| state.user_by_id(id).cloned())
            .ok_or_else(|| AuthError::Rejected {
                status: 401,
                message: "Invalid JWT".to_string(),
            })
    }

    async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        self.lock().resent.push(email.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> UserId {
        UserId::from("u1")
    }

    #[tokio::test]
    async fn test_list_is_scoped_and_ordered() {
        let backend = MemoryBackend::new();
        backend.seed(&owner(), "a", false);
        backend.seed(&UserId::from("u2"), "theirs", false);
        backend.seed(&owner(), "b", true);

        let rows = backend.list_by_owner(&owner()).await.unwrap();
        assert_eq!(rows.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(backend.calls(MemoryOp::List), 1);
    }

    #[tokio::test]
    async fn test_writes_echo_to_matching_subscribers() {
        let backend = MemoryBackend::new();
        let mut mine = backend.subscribe(&owner(), "t").await.unwrap();
        let mut theirs = backend.subscribe(&UserId::from("u2"), "t").await.unwrap();

        let row = backend.insert(&NewItem::new(owner(), "milk")).await.unwrap();
        assert_eq!(
            mine.events.try_recv().unwrap(),
            FeedEvent::Change(ChangeEvent::Insert { new: row })
        );
        assert!(theirs.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_echo_can_be_disabled() {
        let backend = MemoryBackend::new();
        backend.set_echo_own_writes(false);
        let mut sub = backend.subscribe(&owner(), "t").await.unwrap();
        backend.insert(&NewItem::new(owner(), "milk")).await.unwrap();
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let backend = MemoryBackend::new();
        backend.fail(MemoryOp::Insert, QueryError::Network("down".into()));
        assert!(backend.insert(&NewItem::new(owner(), "x")).await.is_err());
        assert!(backend.rows().is_empty());

        backend.clear_failures();
        assert!(backend.insert(&NewItem::new(owner(), "x")).await.is_ok());
        assert_eq!(backend.calls(MemoryOp::Insert), 2);
    }

    #[tokio::test]
    async fn test_closing_removes_subscriber() {
        let backend = MemoryBackend::new();
        let mut sub = backend.subscribe(&owner(), "t").await.unwrap();
        assert_eq!(backend.open_subscriptions(), 1);
        sub.handle.close();
        assert_eq!(backend.open_subscriptions(), 0);
        assert_eq!(backend.subscriptions_closed(), 1);
    }

    #[tokio::test]
    async fn test_auth_flow() {
        let backend = MemoryBackend::new();
        let outcome = backend.sign_up("m@example.com", "pw").await.unwrap();
        assert!(matches!(outcome, SignUpOutcome::NeedsVerification { .. }));
        assert_eq!(
            backend.sign_in_with_password("m@example.com", "pw").await,
            Err(AuthError::EmailNotConfirmed)
        );

        backend.confirm("m@example.com");
        assert_eq!(
            backend.sign_in_with_password("m@example.com", "nope").await,
            Err(AuthError::InvalidCredentials)
        );
        let session = backend.sign_in_with_password("m@example.com", "pw").await.unwrap();
        assert_eq!(
            backend.get_user(&session.access_token).await.unwrap().email.as_deref(),
            Some("m@example.com")
        );

        let refreshed = backend.refresh_session(&session.refresh_token).await.unwrap();
        assert_ne!(refreshed.access_token, session.access_token);
        assert!(backend.refresh_session(&session.refresh_token).await.is_err());
    }
}
