//! Todo-Sync Backend
//!
//! Thin shell around `todo-core`:
//! - state: connection settings and the services built from them
//! - presenter: forwards list snapshots and toasts to the webview as events
//! - commands: Tauri command handlers

use std::path::PathBuf;
use tauri::Manager;

mod commands;
mod presenter;
mod state;

pub use state::{AppState, Services};

/// App data directory, created on first use
fn get_data_dir(app_handle: &tauri::AppHandle) -> PathBuf {
    let app_dir = app_handle
        .path()
        .app_data_dir()
        .expect("failed to get app data dir");
    std::fs::create_dir_all(&app_dir).expect("failed to create app data dir");
    app_dir
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    tauri::Builder::default()
        .setup(|app| {
            // Single instance check - must be first!
            #[cfg(desktop)]
            app.handle().plugin(tauri_plugin_single_instance::init(|_app, _args, _cwd| {
                // Focus the existing window when a new instance tries to start
                if let Some(window) = _app.get_webview_window("main") {
                    let _ = window.set_focus();
                }
            }))?;

            let app_handle = app.handle().clone();

            // Initialize logging
            rolling_logger::init_logger(
                app_handle.path().app_log_dir().expect("failed to get log dir"),
                "TodoSync",
            )
            .expect("failed to init rolling logger");

            let data_dir = get_data_dir(&app_handle);
            log::info!(
                "[{}] App setup starting, data dir {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                data_dir.display()
            );

            let presenter = presenter::TauriPresenter::new(app_handle.clone());
            let state = AppState::load(data_dir, presenter);
            app.manage(state);

            let _ = rolling_logger::info("App setup finished");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            // Session gate + auth
            commands::get_session,
            commands::verification_route,
            commands::sign_in,
            commands::sign_up,
            commands::sign_out,
            commands::resend_verification,
            commands::get_user,
            // Item list
            commands::attach_items,
            commands::detach_items,
            commands::reload_items,
            commands::create_item,
            commands::toggle_item,
            commands::delete_item,
            // Connection settings
            commands::get_remote_config,
            commands::save_remote_config,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
