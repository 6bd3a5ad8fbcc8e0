//! Reconciler Flow Tests
//!
//! End-to-end runs of the reconciler against the in-memory backend:
//! lifecycle, cross-session sync and event ordering around the initial load.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use todo_core::domain::{ChangeEvent, Item, ItemKey, Notification, Session, User, UserId};
use todo_core::remote::memory::{MemoryBackend, MemoryOp};
use todo_core::remote::TokenProvider;
use todo_core::{ItemError, ListSnapshot, Presenter, Reconciler, ReconcilerOptions, SessionManager, SessionStore};

#[derive(Default)]
struct Recorder {
    snapshots: Mutex<Vec<ListSnapshot>>,
    toasts: Mutex<Vec<Notification>>,
}

impl Recorder {
    fn messages(&self) -> Vec<String> {
        self.toasts.lock().unwrap().iter().map(|t| t.message.clone()).collect()
    }

    fn published(&self) -> usize {
        self.snapshots.lock().unwrap().len()
    }
}

impl Presenter for Recorder {
    fn list_changed(&self, snapshot: &ListSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }

    fn notify(&self, notification: Notification) {
        self.toasts.lock().unwrap().push(notification);
    }
}

/// Hands out whatever token the test session was created with
struct FixedToken(&'static str);

#[async_trait]
impl TokenProvider for FixedToken {
    async fn access_token(&self) -> Option<String> {
        Some(self.0.to_string())
    }
}

fn session(user: &str) -> Session {
    Session {
        access_token: format!("token-{}", user),
        refresh_token: "refresh".into(),
        token_type: "bearer".into(),
        expires_at: i64::MAX,
        user: User {
            id: UserId::from(user),
            email: Some(format!("{}@example.com", user)),
            email_confirmed_at: Some("2024-05-01T10:00:00Z".into()),
        },
    }
}

fn reconciler_with(backend: &MemoryBackend, tokens: Arc<dyn TokenProvider>) -> (Reconciler, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let reconciler = Reconciler::new(
        Arc::new(backend.clone()),
        Arc::new(backend.clone()),
        tokens,
        recorder.clone(),
        ReconcilerOptions::default(),
    );
    (reconciler, recorder)
}

fn reconciler_on(backend: &MemoryBackend) -> (Reconciler, Arc<Recorder>) {
    reconciler_with(backend, Arc::new(FixedToken("token-u1")))
}

async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

async fn ids(reconciler: &Reconciler) -> Vec<i64> {
    reconciler.snapshot().await.items.iter().map(|i| i.id).collect()
}

#[tokio::test]
async fn test_two_sessions_stay_in_sync() {
    let backend = MemoryBackend::new();
    let (laptop, laptop_toasts) = reconciler_on(&backend);
    let (phone, phone_toasts) = reconciler_on(&backend);
    laptop.attach(&session("u1")).await.unwrap();
    phone.attach(&session("u1")).await.unwrap();

    let milk = laptop.create("milk").await.unwrap();
    settle().await;
    assert_eq!(ids(&phone).await, vec![milk.id]);
    assert_eq!(phone_toasts.messages(), vec!["New todo added"]);

    phone.toggle_completion(milk.id).await.unwrap();
    settle().await;
    assert!(laptop.snapshot().await.items[0].completed);

    laptop.delete(milk.id).await.unwrap();
    settle().await;
    assert!(ids(&phone).await.is_empty());
    assert!(ids(&laptop).await.is_empty());

    assert_eq!(
        laptop_toasts.messages(),
        vec!["New todo added", "Todo updated", "Todo removed"]
    );
    assert_eq!(
        phone_toasts.messages(),
        vec!["New todo added", "Todo updated", "Todo removed"]
    );
}

#[tokio::test]
async fn test_other_users_do_not_leak_in() {
    let backend = MemoryBackend::new();
    let (mine, mine_toasts) = reconciler_on(&backend);
    let (theirs, _) = reconciler_on(&backend);
    mine.attach(&session("u1")).await.unwrap();
    theirs.attach(&session("u2")).await.unwrap();

    theirs.create("secret").await.unwrap();
    settle().await;

    assert!(ids(&mine).await.is_empty());
    assert!(mine_toasts.messages().is_empty());
}

#[tokio::test]
async fn test_whitespace_item_is_rejected_locally() {
    let backend = MemoryBackend::new();
    backend.seed(&UserId::from("u1"), "milk", false);
    let (reconciler, recorder) = reconciler_on(&backend);
    reconciler.attach(&session("u1")).await.unwrap();
    let before = reconciler.snapshot().await;

    assert_eq!(reconciler.create(" \t ").await, Err(ItemError::EmptyText));

    assert_eq!(backend.calls(MemoryOp::Insert), 0);
    assert_eq!(reconciler.snapshot().await, before);
    assert!(recorder.messages().is_empty());
}

#[tokio::test]
async fn test_detach_closes_subscription_once() {
    let backend = MemoryBackend::new();
    let (reconciler, _) = reconciler_on(&backend);
    reconciler.attach(&session("u1")).await.unwrap();
    assert_eq!(backend.open_subscriptions(), 1);

    reconciler.detach().await;
    reconciler.detach().await;

    assert_eq!(backend.subscriptions_opened(), 1);
    assert_eq!(backend.subscriptions_closed(), 1);
    assert_eq!(backend.open_subscriptions(), 0);
    assert_eq!(reconciler.owner().await, None);
}

#[tokio::test]
async fn test_queued_events_are_dropped_after_detach() {
    let backend = MemoryBackend::new();
    let (reconciler, recorder) = reconciler_on(&backend);
    reconciler.attach(&session("u1")).await.unwrap();
    let published = recorder.published();

    // Queued for the pump, which has not run yet
    backend.push(ChangeEvent::Insert {
        new: Item::new(7, UserId::from("u1"), "late"),
    });
    reconciler.detach().await;
    settle().await;

    assert_eq!(recorder.published(), published);
    assert!(recorder.messages().is_empty());
    assert!(reconciler.snapshot().await.items.is_empty());
}

#[tokio::test]
async fn test_reattach_switches_owner() {
    let backend = MemoryBackend::new();
    backend.seed(&UserId::from("u1"), "mine", false);
    backend.seed(&UserId::from("u2"), "theirs", false);
    let (reconciler, _) = reconciler_on(&backend);

    reconciler.attach(&session("u1")).await.unwrap();
    assert_eq!(ids(&reconciler).await, vec![1]);

    reconciler.attach(&session("u2")).await.unwrap();
    assert_eq!(ids(&reconciler).await, vec![2]);
    assert_eq!(backend.subscriptions_closed(), 1);
    assert_eq!(backend.open_subscriptions(), 1);
}

#[tokio::test]
async fn test_events_during_load_survive_snapshot() {
    let backend = MemoryBackend::new();
    let owner = UserId::from("u1");
    let (reconciler, recorder) = reconciler_on(&backend);
    let gate = backend.hold_list();

    let attaching = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.attach(&session("u1")).await })
    };
    settle().await;
    assert_eq!(backend.calls(MemoryOp::List), 1);
    assert!(reconciler.snapshot().await.loading);

    // Arrives while the fetch is in flight and is missing from its result
    backend.push(ChangeEvent::Insert {
        new: Item::new(50, owner.clone(), "from another device"),
    });
    settle().await;
    assert_eq!(ids(&reconciler).await, vec![50]);

    backend.seed(&owner, "stored", false);
    gate.notify_one();
    attaching.await.unwrap().unwrap();

    let snapshot = reconciler.snapshot().await;
    assert!(!snapshot.loading);
    assert_eq!(snapshot.items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 50]);
    assert_eq!(recorder.messages(), vec!["New todo added"]);
}

#[tokio::test]
async fn test_delete_replayed_during_load_stays_deleted() {
    let backend = MemoryBackend::new();
    let owner = UserId::from("u1");
    let stale = backend.seed(&owner, "gone soon", false);
    let (reconciler, _) = reconciler_on(&backend);
    let gate = backend.hold_list();

    let attaching = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.attach(&session("u1")).await })
    };
    settle().await;

    // The fetch result below still contains the row
    backend.push(ChangeEvent::Delete { old: ItemKey::new(stale.id) });
    settle().await;
    gate.notify_one();
    attaching.await.unwrap().unwrap();

    assert!(ids(&reconciler).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_lost_feed_reopens_and_catches_up() {
    let backend = MemoryBackend::new();
    let owner = UserId::from("u1");
    let (reconciler, recorder) = reconciler_on(&backend);
    reconciler.attach(&session("u1")).await.unwrap();

    backend.disconnect("socket closed");
    settle().await;
    assert_eq!(recorder.messages(), vec!["Live updates disconnected"]);
    assert_eq!(backend.open_subscriptions(), 0);

    // Written while nobody listened
    let missed = backend.seed(&owner, "while offline", false);
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(backend.subscriptions_opened(), 2);
    assert_eq!(backend.open_subscriptions(), 1);
    assert_eq!(ids(&reconciler).await, vec![missed.id]);

    backend.push(ChangeEvent::Insert {
        new: Item::new(30, owner, "back online"),
    });
    settle().await;
    assert_eq!(ids(&reconciler).await, vec![missed.id, 30]);
    assert_eq!(recorder.messages(), vec!["Live updates disconnected", "New todo added"]);
}

#[tokio::test(start_paused = true)]
async fn test_lost_feed_stays_closed_after_detach() {
    let backend = MemoryBackend::new();
    let (reconciler, _) = reconciler_on(&backend);
    reconciler.attach(&session("u1")).await.unwrap();

    backend.disconnect("socket closed");
    settle().await;
    reconciler.detach().await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(backend.subscriptions_opened(), 1);
    assert_eq!(backend.open_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_expired_token_is_renewed_while_attached() {
    let dir = tempfile::tempdir().unwrap();
    let backend = MemoryBackend::new();
    backend.add_user("m@example.com", "pw", true);
    let sessions = Arc::new(SessionManager::new(
        Arc::new(backend.clone()),
        SessionStore::in_dir(dir.path()),
    ));

    // Signed in long enough ago that the token is past its lifetime
    backend.set_session_ttl(0);
    let stale = sessions.sign_in("m@example.com", "pw").await.unwrap();
    backend.set_session_ttl(3600);
    assert!(stale.is_expired());

    let (reconciler, recorder) = reconciler_with(&backend, sessions.clone());
    reconciler.attach(&stale).await.unwrap();
    assert_eq!(backend.subscribe_tokens(), vec![stale.access_token.clone()]);

    // The service drops the channel once the join token expires
    backend.disconnect("token expired");
    tokio::time::sleep(Duration::from_secs(3)).await;

    let fresh = sessions.current().unwrap();
    assert_ne!(fresh.access_token, stale.access_token);
    assert!(!fresh.is_expired());
    assert_eq!(backend.subscribe_tokens().last(), Some(&fresh.access_token));
    assert_eq!(backend.open_subscriptions(), 1);

    let milk = reconciler.create("milk").await.unwrap();
    settle().await;
    assert_eq!(ids(&reconciler).await, vec![milk.id]);
    assert_eq!(recorder.messages(), vec!["Live updates disconnected", "New todo added"]);
}
