//! List Reconciler
//!
//! Keeps the signed-in user's local item list consistent with the remote
//! table: one scoped fetch on attach, then change events folded in as they
//! arrive, plus create/toggle/delete sent to the service.
//!
//! - list: the pure, idempotent fold over [`ChangeEvent`](crate::domain::ChangeEvent)s
//! - liveness: generation tokens that stop work outliving its view
//! - reconciler: the owned state object that ties list, feed and repository together

mod list;
mod liveness;
mod reconciler;

use serde::{Deserialize, Serialize};

use crate::domain::{Item, Notification};

pub use list::{FoldOutcome, ItemList};
pub use liveness::{Liveness, LivenessToken};
pub use reconciler::{Reconciler, ReconcilerOptions};

/// What the presentation layer renders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListSnapshot {
    pub items: Vec<Item>,
    pub loading: bool,
    pub error: Option<String>,
}

/// Sink for list changes and toasts
pub trait Presenter: Send + Sync {
    fn list_changed(&self, snapshot: &ListSnapshot);

    fn notify(&self, notification: Notification);
}
