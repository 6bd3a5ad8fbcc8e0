//! Item List
//!
//! The owner-scoped, id-ordered local copy of the items table and the fold
//! that merges change events into it.
//!
//! Invariants held after every operation:
//! - items are sorted ascending by id, with no duplicate ids
//! - every item belongs to the list's owner

use serde::Serialize;

use crate::domain::{ChangeEvent, ChangeKind, Item, ItemId, ItemKey, UserId};

/// Result of folding one event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldOutcome {
    /// The list changed
    Changed(ChangeKind),
    /// The event was for this owner but the list already reflected it
    Unchanged,
    /// The event belongs to another owner
    Foreign,
}

impl FoldOutcome {
    pub fn changed(&self) -> Option<ChangeKind> {
        match self {
            FoldOutcome::Changed(kind) => Some(*kind),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemList {
    owner: UserId,
    items: Vec<Item>,
}

impl ItemList {
    pub fn new(owner: UserId) -> Self {
        Self { owner, items: Vec::new() }
    }

    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: ItemId) -> Option<&Item> {
        self.position(id).ok().map(|pos| &self.items[pos])
    }

    /// Replace the whole list with a fetched result.
    ///
    /// Rows of other owners are dropped; for duplicate ids the later row wins.
    pub fn replace_all(&mut self, rows: Vec<Item>) {
        let mut rows: Vec<Item> = rows.into_iter().filter(|row| row.is_owned_by(&self.owner)).collect();
        // Stable sort keeps arrival order within an id, so `dedup` can keep the last
        rows.sort_by_key(|row| row.id);
        rows.reverse();
        rows.dedup_by_key(|row| row.id);
        rows.reverse();
        self.items = rows;
    }

    /// Fold one change event into the list
    pub fn apply(&mut self, event: &ChangeEvent) -> FoldOutcome {
        match event {
            ChangeEvent::Insert { new } => self.apply_insert(new),
            ChangeEvent::Update { new, .. } => self.apply_update(new),
            ChangeEvent::Delete { old } => self.apply_delete(old),
        }
    }

    fn position(&self, id: ItemId) -> Result<usize, usize> {
        self.items.binary_search_by_key(&id, |item| item.id)
    }

    fn apply_insert(&mut self, new: &Item) -> FoldOutcome {
        if !new.is_owned_by(&self.owner) {
            return FoldOutcome::Foreign;
        }
        match self.position(new.id) {
            Ok(pos) if self.items[pos] == *new => FoldOutcome::Unchanged,
            Ok(pos) => {
                // Replayed insert with newer content: keep the newest row, still an insert
                self.items[pos] = new.clone();
                FoldOutcome::Changed(ChangeKind::Added)
            }
            Err(pos) => {
                self.items.insert(pos, new.clone());
                FoldOutcome::Changed(ChangeKind::Added)
            }
        }
    }

    fn apply_update(&mut self, new: &Item) -> FoldOutcome {
        if !new.is_owned_by(&self.owner) {
            // A row that moved to another owner must leave this list
            return match self.position(new.id) {
                Ok(pos) => {
                    self.items.remove(pos);
                    FoldOutcome::Changed(ChangeKind::Removed)
                }
                Err(_) => FoldOutcome::Foreign,
            };
        }
        match self.position(new.id) {
            Ok(pos) if self.items[pos] == *new => FoldOutcome::Unchanged,
            Ok(pos) => {
                self.items[pos] = new.clone();
                FoldOutcome::Changed(ChangeKind::Updated)
            }
            Err(_) => FoldOutcome::Unchanged,
        }
    }

    fn apply_delete(&mut self, old: &ItemKey) -> FoldOutcome {
        if let Some(owner) = &old.owner {
            if owner != &self.owner {
                return FoldOutcome::Foreign;
            }
        }
        match self.position(old.id) {
            Ok(pos) => {
                self.items.remove(pos);
                FoldOutcome::Changed(ChangeKind::Removed)
            }
            Err(_) => FoldOutcome::Unchanged,
        }
    }
}
