//! Item Entity
//!
//! A single to-do row of the remote items table.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the remote service on insert
pub type ItemId = i64;

/// Opaque identifier of an authenticated user
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// A to-do item owned by one user
///
/// Field names follow the remote table, except `owner` which is stored as `user_id`.
/// Columns the app does not use (timestamps etc.) are dropped on decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier, immutable once assigned
    pub id: ItemId,
    /// User who created the item
    #[serde(rename = "user_id")]
    pub owner: UserId,
    /// Free-form content
    pub text: String,
    /// Completion status
    pub completed: bool,
}

impl Item {
    pub fn new(id: ItemId, owner: UserId, text: impl Into<String>) -> Self {
        Self {
            id,
            owner,
            text: text.into(),
            completed: false,
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey {
            id: self.id,
            owner: Some(self.owner.clone()),
        }
    }

    pub fn is_owned_by(&self, owner: &UserId) -> bool {
        &self.owner == owner
    }
}

/// Identity of a row as seen in "old" records of change notifications.
///
/// The service only guarantees the primary key there, so the owner may be missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemKey {
    pub id: ItemId,
    #[serde(rename = "user_id", default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,
}

impl ItemKey {
    pub fn new(id: ItemId) -> Self {
        Self { id, owner: None }
    }
}

/// Insert payload for a new item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewItem {
    #[serde(rename = "user_id")]
    pub owner: UserId,
    pub text: String,
    pub completed: bool,
}

impl NewItem {
    pub fn new(owner: UserId, text: impl Into<String>) -> Self {
        Self {
            owner,
            text: text.into(),
            completed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_decodes_remote_row() {
        let row = r#"{"id":3,"user_id":"u1","text":"milk","completed":false,"inserted_at":"2024-05-01T10:00:00+00:00"}"#;
        let item: Item = serde_json::from_str(row).unwrap();
        assert_eq!(item, Item::new(3, UserId::from("u1"), "milk"));
    }

    #[test]
    fn test_item_key_without_owner() {
        let key: ItemKey = serde_json::from_str(r#"{"id":7}"#).unwrap();
        assert_eq!(key, ItemKey::new(7));
    }

    #[test]
    fn test_new_item_serializes_owner_column() {
        let json = serde_json::to_value(NewItem::new(UserId::from("u1"), "bread")).unwrap();
        assert_eq!(json["user_id"], "u1");
        assert_eq!(json["completed"], false);
        assert!(json.get("id").is_none());
    }
}
