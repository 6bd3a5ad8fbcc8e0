//! Webview Presenter
//!
//! Emits reconciler output to the frontend:
//! - `items-changed` with a `ListSnapshot`
//! - `toast` with a `Notification`

use tauri::{AppHandle, Emitter};

use todo_core::domain::Notification;
use todo_core::{ListSnapshot, Presenter};

pub const ITEMS_CHANGED_EVENT: &str = "items-changed";
pub const TOAST_EVENT: &str = "toast";

pub struct TauriPresenter {
    app: AppHandle,
}

impl TauriPresenter {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl Presenter for TauriPresenter {
    fn list_changed(&self, snapshot: &ListSnapshot) {
        if let Err(e) = self.app.emit(ITEMS_CHANGED_EVENT, snapshot) {
            log::error!("Failed to emit {}: {}", ITEMS_CHANGED_EVENT, e);
        }
    }

    fn notify(&self, notification: Notification) {
        log::debug!("Toast ({:?}): {}", notification.level, notification.message);
        if let Err(e) = self.app.emit(TOAST_EVENT, &notification) {
            log::error!("Failed to emit {}: {}", TOAST_EVENT, e);
        }
    }
}
