//! Change Events
//!
//! Row-level notifications pushed by the remote service for the items table.

use serde::{Deserialize, Serialize};

use super::item::{Item, ItemId, ItemKey};

/// One insert/update/delete notification, carrying only the records valid for its kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChangeEvent {
    Insert { new: Item },
    Update { new: Item, old: ItemKey },
    Delete { old: ItemKey },
}

impl ChangeEvent {
    pub fn id(&self) -> ItemId {
        match self {
            ChangeEvent::Insert { new } | ChangeEvent::Update { new, .. } => new.id,
            ChangeEvent::Delete { old } => old.id,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Insert { .. } => ChangeKind::Added,
            ChangeEvent::Update { .. } => ChangeKind::Updated,
            ChangeEvent::Delete { .. } => ChangeKind::Removed,
        }
    }

    /// Update event for a row whose previous state is unknown beyond its key
    pub fn updated(new: Item) -> Self {
        let old = ItemKey::new(new.id);
        ChangeEvent::Update { new, old }
    }
}

/// What happened to the local list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Updated,
    Removed,
}
