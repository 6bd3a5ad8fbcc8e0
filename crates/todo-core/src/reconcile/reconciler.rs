//! Reconciler
//!
//! Owned, cloneable handle around the local list. The shell creates one per
//! app and drives it through explicit lifecycle calls: `attach` when the
//! list view appears, `detach` when it goes away.
//!
//! All state lives behind one async mutex. Change events are applied by a
//! single pump task per subscription, one at a time in arrival order. Remote
//! failures are turned into notifications here and never partially mutate
//! the list.
//!
//! A change feed that drops while attached is reopened once, after a short
//! pause, with a current (refreshed if needed) access token; the list is then
//! fetched again to pick up whatever changed in the gap.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::{mpsc, Mutex, MutexGuard};

use super::list::{FoldOutcome, ItemList};
use super::liveness::{Liveness, LivenessToken};
use super::{ListSnapshot, Presenter};
use crate::config::RemoteConfig;
use crate::domain::{ChangeEvent, Item, ItemId, NewItem, Notification, Session, UserId};
use crate::error::{ChannelError, ItemError, QueryError};
use crate::remote::{ChangeFeed, FeedEvent, ItemRepository, Subscription, SubscriptionHandle, TokenProvider};

const FETCH_FAILED: &str = "Failed to fetch todos";
const ADD_FAILED: &str = "Failed to add todo";
const UPDATE_FAILED: &str = "Failed to update todo";
const REMOVE_FAILED: &str = "Failed to remove todo";
const FEED_UNAVAILABLE: &str = "Live updates are unavailable";
const FEED_LOST: &str = "Live updates disconnected";

/// Pause before reopening a lost change feed
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerOptions {
    /// Fold the row returned by a confirmed write instead of waiting for its
    /// change event. The fold is idempotent, so the later event is a no-op.
    pub apply_write_results: bool,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            apply_write_results: true,
        }
    }
}

impl From<&RemoteConfig> for ReconcilerOptions {
    fn from(config: &RemoteConfig) -> Self {
        Self {
            apply_write_results: config.apply_write_results,
        }
    }
}

#[derive(Debug, Default)]
struct ListState {
    /// `None` while detached
    list: Option<ItemList>,
    loading: bool,
    error: Option<String>,
    /// Events folded while the initial fetch was in flight
    pending: Vec<ChangeEvent>,
    subscription: Option<SubscriptionHandle>,
}

impl ListState {
    fn attached(owner: UserId) -> Self {
        Self {
            list: Some(ItemList::new(owner)),
            loading: true,
            ..Default::default()
        }
    }

    fn owner(&self) -> Option<&UserId> {
        self.list.as_ref().map(ItemList::owner)
    }

    fn snapshot(&self) -> ListSnapshot {
        ListSnapshot {
            items: self.list.as_ref().map(|list| list.items().to_vec()).unwrap_or_default(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }
}

struct Inner {
    repo: Arc<dyn ItemRepository>,
    feed: Arc<dyn ChangeFeed>,
    tokens: Arc<dyn TokenProvider>,
    presenter: Arc<dyn Presenter>,
    options: ReconcilerOptions,
    state: Mutex<ListState>,
    liveness: Liveness,
}

#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl Reconciler {
    pub fn new(
        repo: Arc<dyn ItemRepository>,
        feed: Arc<dyn ChangeFeed>,
        tokens: Arc<dyn TokenProvider>,
        presenter: Arc<dyn Presenter>,
        options: ReconcilerOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                repo,
                feed,
                tokens,
                presenter,
                options,
                state: Mutex::new(ListState::default()),
                liveness: Liveness::new(),
            }),
        }
    }

    pub fn options(&self) -> ReconcilerOptions {
        self.inner.options
    }

    pub async fn snapshot(&self) -> ListSnapshot {
        self.inner.state.lock().await.snapshot()
    }

    /// Owner of the attached list, if any
    pub async fn owner(&self) -> Option<UserId> {
        self.inner.state.lock().await.owner().cloned()
    }

    // ========================
    // Lifecycle
    // ========================

    /// Start showing `session`'s list: open the change feed, then fetch.
    ///
    /// A feed failure is reported but does not stop the fetch. Attaching
    /// again first tears down the previous attachment.
    pub async fn attach(&self, session: &Session) -> Result<(), ItemError> {
        let owner = session.user_id().clone();
        let token = {
            let mut state = self.inner.state.lock().await;
            let token = self.inner.liveness.renew();
            if let Some(mut previous) = state.subscription.take() {
                previous.close();
            }
            *state = ListState::attached(owner.clone());
            self.publish(&state);
            token
        };
        log::info!("[RECONCILER] Attaching list of {}", owner);

        // Reported to the user already; the list stays usable without it
        let _ = self.open_feed(token, &owner, &session.access_token).await;
        self.load(token, &owner).await
    }

    /// Stop all work for the current list. Safe to call repeatedly.
    pub async fn detach(&self) {
        let handle = {
            let mut state = self.inner.state.lock().await;
            self.inner.liveness.renew();
            let handle = state.subscription.take();
            *state = ListState::default();
            handle
        };
        if let Some(mut handle) = handle {
            if handle.close() {
                log::info!("[RECONCILER] Detached, change feed closed");
            }
        }
    }

    /// Re-fetch the attached list and replace local state with the result
    pub async fn initialize(&self) -> Result<(), ItemError> {
        let (token, owner) = {
            let mut state = self.inner.state.lock().await;
            let owner = state.owner().cloned().ok_or(ItemError::NotAttached)?;
            state.loading = true;
            self.publish(&state);
            (self.inner.liveness.current(), owner)
        };
        self.load(token, &owner).await
    }

    /// (Re)open the change feed for the attached list, e.g. after it dropped
    pub async fn subscribe(&self, access_token: &str) -> Result<(), ChannelError> {
        let (token, owner) = {
            let state = self.inner.state.lock().await;
            let owner = state
                .owner()
                .cloned()
                .ok_or_else(|| ChannelError::Join("no list attached".to_string()))?;
            (self.inner.liveness.current(), owner)
        };
        self.open_feed(token, &owner, access_token).await
    }

    // ========================
    // Writes
    // ========================

    pub async fn create(&self, text: &str) -> Result<Item, ItemError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ItemError::EmptyText);
        }
        let (token, owner) = self.attached().await?;

        match self.inner.repo.insert(&NewItem::new(owner, text)).await {
            Ok(row) => {
                if self.inner.options.apply_write_results {
                    self.fold(token, &ChangeEvent::Insert { new: row.clone() }).await;
                }
                Ok(row)
            }
            Err(err) => Err(self.write_failed(token, ADD_FAILED, err).await),
        }
    }

    /// Flip `completed` of a listed item. `Ok(None)` if the row is gone remotely.
    pub async fn toggle_completion(&self, id: ItemId) -> Result<Option<Item>, ItemError> {
        let (token, completed) = {
            let state = self.inner.state.lock().await;
            let list = state.list.as_ref().ok_or(ItemError::NotAttached)?;
            let item = list.get(id).ok_or(ItemError::UnknownItem(id))?;
            (self.inner.liveness.current(), !item.completed)
        };

        match self.inner.repo.set_completed(id, completed).await {
            Ok(Some(row)) => {
                if self.inner.options.apply_write_results {
                    self.fold(token, &ChangeEvent::updated(row.clone())).await;
                }
                Ok(Some(row))
            }
            Ok(None) => {
                log::warn!("[RECONCILER] Toggle matched no row for id {}", id);
                Ok(None)
            }
            Err(err) => Err(self.write_failed(token, UPDATE_FAILED, err).await),
        }
    }

    pub async fn delete(&self, id: ItemId) -> Result<(), ItemError> {
        let (token, _) = self.attached().await?;

        match self.inner.repo.delete(id).await {
            Ok(Some(old)) => {
                if self.inner.options.apply_write_results {
                    self.fold(token, &ChangeEvent::Delete { old }).await;
                }
                Ok(())
            }
            Ok(None) => {
                log::warn!("[RECONCILER] Delete matched no row for id {}", id);
                Ok(())
            }
            Err(err) => Err(self.write_failed(token, REMOVE_FAILED, err).await),
        }
    }

    // ========================
    // Internals
    // ========================

    fn publish(&self, state: &MutexGuard<'_, ListState>) {
        self.inner.presenter.list_changed(&state.snapshot());
    }

    async fn attached(&self) -> Result<(LivenessToken, UserId), ItemError> {
        let state = self.inner.state.lock().await;
        let owner = state.owner().cloned().ok_or(ItemError::NotAttached)?;
        Ok((self.inner.liveness.current(), owner))
    }

    async fn write_failed(&self, token: LivenessToken, message: &str, err: QueryError) -> ItemError {
        log::error!("[RECONCILER] {}: {}", message, err);
        let _state = self.inner.state.lock().await;
        if self.inner.liveness.is_live(token) {
            self.inner.presenter.notify(Notification::error(message));
        }
        ItemError::Remote(err)
    }

    async fn load(&self, token: LivenessToken, owner: &UserId) -> Result<(), ItemError> {
        let fetched = self.inner.repo.list_by_owner(owner).await;

        let mut state = self.inner.state.lock().await;
        if !self.inner.liveness.is_live(token) {
            log::debug!("[RECONCILER] Dropping fetch result for a detached list");
            return Ok(());
        }
        state.loading = false;
        let pending = std::mem::take(&mut state.pending);

        match fetched {
            Ok(rows) => {
                if let Some(list) = state.list.as_mut() {
                    list.replace_all(rows);
                    for event in &pending {
                        list.apply(event);
                    }
                    log::info!("[RECONCILER] Loaded {} items for {}", list.len(), owner);
                }
                state.error = None;
                self.publish(&state);
                Ok(())
            }
            Err(err) => {
                log::error!("[RECONCILER] {}: {}", FETCH_FAILED, err);
                state.error = Some(FETCH_FAILED.to_string());
                self.publish(&state);
                self.inner.presenter.notify(Notification::error(FETCH_FAILED));
                Err(err.into())
            }
        }
    }

    async fn open_feed(&self, token: LivenessToken, owner: &UserId, access_token: &str) -> Result<(), ChannelError> {
        match self.inner.feed.subscribe(owner, access_token).await {
            Ok(Subscription { events, mut handle }) => {
                let mut state = self.inner.state.lock().await;
                if !self.inner.liveness.is_live(token) {
                    handle.close();
                    return Ok(());
                }
                if let Some(mut previous) = state.subscription.replace(handle) {
                    previous.close();
                }
                drop(state);
                tokio::spawn(self.clone().pump(token, events));
                Ok(())
            }
            Err(err) => {
                log::warn!("[RECONCILER] Subscribe failed: {}", err);
                let _state = self.inner.state.lock().await;
                if self.inner.liveness.is_live(token) {
                    self.inner.presenter.notify(Notification::error(FEED_UNAVAILABLE));
                }
                Err(err)
            }
        }
    }

    /// Applies one subscription's events in order. Boxed: a lost feed reopens
    /// itself from in here, which spawns the next pump.
    fn pump(self, token: LivenessToken, mut events: mpsc::UnboundedReceiver<FeedEvent>) -> BoxFuture<'static, ()> {
        async move {
            while let Some(event) = events.recv().await {
                match event {
                    FeedEvent::Change(change) => {
                        if self.fold(token, &change).await.is_none() {
                            break;
                        }
                    }
                    FeedEvent::Lost(err) => {
                        {
                            let _state = self.inner.state.lock().await;
                            if !self.inner.liveness.is_live(token) {
                                break;
                            }
                            log::warn!("[RECONCILER] Change feed lost: {}", err);
                            self.inner.presenter.notify(Notification::error(FEED_LOST));
                        }
                        self.reconnect(token).await;
                        break;
                    }
                }
            }
            log::debug!("[RECONCILER] Event pump finished");
        }
        .boxed()
    }

    /// Reopen the feed of a still-attached list and catch up on missed changes
    async fn reconnect(&self, token: LivenessToken) {
        tokio::time::sleep(RECONNECT_DELAY).await;
        if !self.inner.liveness.is_live(token) {
            return;
        }
        let Some(access_token) = self.inner.tokens.access_token().await else {
            log::warn!("[RECONCILER] Not reopening change feed, no session");
            return;
        };
        if !self.inner.liveness.is_live(token) {
            return;
        }

        log::info!("[RECONCILER] Reopening change feed");
        if self.subscribe(&access_token).await.is_err() {
            // Reported by `open_feed`
            return;
        }
        if self.inner.liveness.is_live(token) {
            if let Err(e) = self.initialize().await {
                log::warn!("[RECONCILER] Catch-up fetch failed: {}", e);
            }
        }
    }

    /// Fold under `token`; `None` once the token is stale
    async fn fold(&self, token: LivenessToken, event: &ChangeEvent) -> Option<FoldOutcome> {
        let mut state = self.inner.state.lock().await;
        if !self.inner.liveness.is_live(token) {
            return None;
        }
        let outcome = state.list.as_mut()?.apply(event);
        if state.loading {
            state.pending.push(event.clone());
        }
        if let Some(kind) = outcome.changed() {
            self.publish(&state);
            self.inner.presenter.notify(Notification::for_change(kind));
        }
        Some(outcome)
    }
}
