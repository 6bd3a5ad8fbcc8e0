//! Tauri Command Wrappers
//!
//! Frontend bindings to backend commands and events, organized by domain.

mod auth;
mod config;
mod events;
mod item;

use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    /// Rejects with the command's error string
    #[wasm_bindgen(catch, js_namespace = ["window", "__TAURI__", "core"])]
    async fn invoke(cmd: &str, args: JsValue) -> Result<JsValue, JsValue>;

    /// Resolves to the unlisten function
    #[wasm_bindgen(js_namespace = ["window", "__TAURI__", "event"])]
    async fn listen(event: &str, handler: &Closure<dyn FnMut(JsValue)>) -> JsValue;
}

fn error_message(err: JsValue) -> String {
    err.as_string().unwrap_or_else(|| format!("{:?}", err))
}

fn to_args<T: Serialize>(args: &T) -> Result<JsValue, String> {
    serde_wasm_bindgen::to_value(args).map_err(|e| format!("Serialization error: {}", e))
}

/// Invoke a command and decode its result
async fn call<T: DeserializeOwned>(cmd: &str, args: JsValue) -> Result<T, String> {
    let result = invoke(cmd, args).await.map_err(error_message)?;
    serde_wasm_bindgen::from_value(result).map_err(|e| format!("Response error: {}", e))
}

// Re-export all public items
pub use auth::*;
pub use config::*;
pub use events::*;
pub use item::*;
