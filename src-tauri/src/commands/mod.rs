//! Commands Layer
//!
//! Tauri command handlers that bridge frontend to the session manager and
//! the list reconciler.

mod auth_cmd;
mod config_cmd;
mod item_cmd;

pub use auth_cmd::*;
pub use config_cmd::*;
pub use item_cmd::*;
