//! Global Application State Store
//!
//! Uses Leptos reactive_stores for fine-grained reactivity.

use leptos::prelude::*;
use reactive_stores::Store;
use crate::models::{Item, ListSnapshot, Notification};

/// A toast on screen
#[derive(Clone, Debug, PartialEq)]
pub struct Toast {
    pub id: u32,
    pub notification: Notification,
}

/// Global application state with field-level reactivity
#[derive(Clone, Debug, Default, Store)]
pub struct AppState {
    /// The signed-in user's items, ascending by id
    pub items: Vec<Item>,
    /// Initial fetch in flight
    pub loading: bool,
    /// Set when the last fetch failed
    pub error: Option<String>,
    /// Visible toasts, oldest first
    pub toasts: Vec<Toast>,
    pub next_toast_id: u32,
}

/// Type alias for the store
pub type AppStore = Store<AppState>;

/// Get the app store from context
pub fn use_app_store() -> AppStore {
    expect_context::<AppStore>()
}

// ========================
// Store Helper Functions
// ========================

/// Replace the list with a backend snapshot
pub fn store_apply_snapshot(store: &AppStore, snapshot: ListSnapshot) {
    *store.items().write() = snapshot.items;
    *store.loading().write() = snapshot.loading;
    *store.error().write() = snapshot.error;
}

/// Forget the list, e.g. after sign-out
pub fn store_clear_items(store: &AppStore) {
    store_apply_snapshot(store, ListSnapshot::default());
}

/// Add a toast, returning its id
pub fn store_push_toast(store: &AppStore, notification: Notification) -> u32 {
    let id = store.next_toast_id().get_untracked();
    *store.next_toast_id().write() = id.wrapping_add(1);
    store.toasts().write().push(Toast { id, notification });
    id
}

/// Remove a toast by ID
pub fn store_dismiss_toast(store: &AppStore, toast_id: u32) {
    store.toasts().write().retain(|toast| toast.id != toast_id);
}
