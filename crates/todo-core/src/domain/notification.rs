//! Transient user-visible notifications (toasts).

use serde::{Deserialize, Serialize};

use super::event::ChangeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Success, message: message.into() }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Info, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NotificationLevel::Error, message: message.into() }
    }

    /// Toast for a change that reached the local list
    pub fn for_change(kind: ChangeKind) -> Self {
        match kind {
            ChangeKind::Added => Self::success("New todo added"),
            ChangeKind::Updated => Self::info("Todo updated"),
            ChangeKind::Removed => Self::info("Todo removed"),
        }
    }
}
