//! Tauri Commands for the Item List
//!
//! The list view attaches on mount and detaches on cleanup. Everything in
//! between arrives as `items-changed` and `toast` events; these commands
//! only report failures the view has to react to itself.

use tauri::State;

use todo_core::domain::{Item, ItemId};
use todo_core::ListSnapshot;
use crate::AppState;

/// Start syncing the signed-in user's list
#[tauri::command]
pub async fn attach_items(state: State<'_, AppState>) -> Result<ListSnapshot, String> {
    let services = state.services().await?;
    let session = services
        .sessions
        .get_session()
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| "Not signed in".to_string())?;

    if let Err(e) = services.reconciler.attach(&session).await {
        // Already shown as a toast and flagged in the snapshot
        log::warn!("attach_items: {}", e);
    }
    Ok(services.reconciler.snapshot().await)
}

#[tauri::command]
pub async fn detach_items(state: State<'_, AppState>) -> Result<(), String> {
    let services = state.services().await?;
    services.reconciler.detach().await;
    Ok(())
}

/// Fetch the list again, e.g. after a failed load
#[tauri::command]
pub async fn reload_items(state: State<'_, AppState>) -> Result<ListSnapshot, String> {
    let services = state.services().await?;
    if let Err(e) = services.reconciler.initialize().await {
        log::warn!("reload_items: {}", e);
    }
    Ok(services.reconciler.snapshot().await)
}

/// Create a new item
#[tauri::command]
pub async fn create_item(state: State<'_, AppState>, text: String) -> Result<Item, String> {
    let services = state.services().await?;
    services.reconciler.create(&text).await.map_err(|e| e.to_string())
}

/// Flip completion; `None` when the row no longer exists remotely
#[tauri::command]
pub async fn toggle_item(state: State<'_, AppState>, id: ItemId) -> Result<Option<Item>, String> {
    let services = state.services().await?;
    services
        .reconciler
        .toggle_completion(id)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn delete_item(state: State<'_, AppState>, id: ItemId) -> Result<(), String> {
    let services = state.services().await?;
    services.reconciler.delete(id).await.map_err(|e| e.to_string())
}
