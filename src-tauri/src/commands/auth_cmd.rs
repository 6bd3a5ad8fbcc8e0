//! Tauri Commands for the Session Gate and Auth
//!
//! Auth failures come back as their message so forms can show them inline.

use serde::Serialize;
use tauri::State;

use todo_core::domain::User;
use todo_core::gate::{self, Route};
use crate::AppState;

/// Where the UI should go, plus the address to show on the verify card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateView {
    pub route: Route,
    pub email: Option<String>,
}

/// Session Gate: the route for the current (possibly refreshed) session
#[tauri::command]
pub async fn get_session(state: State<'_, AppState>) -> Result<GateView, String> {
    let Ok(services) = state.services().await else {
        return Ok(GateView {
            route: gate::initial_route(false, None),
            email: None,
        });
    };
    let session = services.sessions.get_session().await.map_err(|e| e.to_string())?;
    Ok(GateView {
        route: gate::initial_route(true, session.as_ref()),
        email: session.and_then(|s| s.user.email),
    })
}

/// Route for the verify-email card: the list once a session exists
#[tauri::command]
pub async fn verification_route(state: State<'_, AppState>) -> Result<GateView, String> {
    let services = state.services().await?;
    let session = services.sessions.get_session().await.map_err(|e| e.to_string())?;
    Ok(GateView {
        route: gate::verify_email_route(session.as_ref()),
        email: services.sessions.pending_verification(),
    })
}

#[tauri::command]
pub async fn sign_in(state: State<'_, AppState>, email: String, password: String) -> Result<GateView, String> {
    let services = state.services().await?;
    let session = services
        .sessions
        .sign_in(&email, &password)
        .await
        .map_err(|e| e.to_string())?;
    Ok(GateView {
        route: gate::route_for(Some(&session)),
        email: session.user.email,
    })
}

#[tauri::command]
pub async fn sign_up(state: State<'_, AppState>, email: String, password: String) -> Result<GateView, String> {
    let services = state.services().await?;
    let outcome = services
        .sessions
        .sign_up(&email, &password)
        .await
        .map_err(|e| e.to_string())?;
    Ok(GateView {
        route: gate::route_after_sign_up(&outcome),
        email: Some(email.trim().to_string()),
    })
}

/// Sign out; the list is torn down and the local session cleared either way
#[tauri::command]
pub async fn sign_out(state: State<'_, AppState>) -> Result<(), String> {
    let services = state.services().await?;
    services.reconciler.detach().await;
    services.sessions.sign_out().await.map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn resend_verification(state: State<'_, AppState>, email: Option<String>) -> Result<(), String> {
    let services = state.services().await?;
    services
        .sessions
        .resend_verification(email.as_deref())
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn get_user(state: State<'_, AppState>) -> Result<User, String> {
    let services = state.services().await?;
    services.sessions.get_user().await.map_err(|e| e.to_string())
}
