//! Domain Layer
//!
//! Entities shared by the reconciler, the remote clients and the shell.
//! This layer has NO external dependencies (except serde and chrono).

mod item;
mod event;
mod session;
mod notification;

pub use item::{Item, ItemId, ItemKey, NewItem, UserId};
pub use event::{ChangeEvent, ChangeKind};
pub use session::{Session, SignUpOutcome, User};
pub use notification::{Notification, NotificationLevel};
