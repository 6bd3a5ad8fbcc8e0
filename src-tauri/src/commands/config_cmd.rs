//! Connection Settings Commands
//!
//! Read and save the hosted project URL and anon key.

use tauri::State;

use todo_core::RemoteConfig;
use crate::AppState;

/// Current settings, `None` until configured
#[tauri::command]
pub async fn get_remote_config(state: State<'_, AppState>) -> Result<Option<RemoteConfig>, String> {
    Ok(state.config().await)
}

/// Validate, persist and apply new settings. Other fields keep their values.
#[tauri::command]
pub async fn save_remote_config(state: State<'_, AppState>, url: String, anon_key: String) -> Result<(), String> {
    let mut config = state.config().await.unwrap_or_default();
    config.url = url.trim().to_string();
    config.anon_key = anon_key.trim().to_string();
    state.reconfigure(config).await.map_err(|e| e.to_string())
}
