//! Connection Settings Commands
//!
//! Frontend bindings for reading and saving the remote service settings.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use super::{call, to_args};
use crate::models::RemoteConfig;

#[derive(Serialize)]
struct SaveConfigArgs<'a> {
    url: &'a str,
    #[serde(rename = "anonKey")]
    anon_key: &'a str,
}

pub async fn get_remote_config() -> Result<Option<RemoteConfig>, String> {
    call("get_remote_config", JsValue::NULL).await
}

pub async fn save_remote_config(url: &str, anon_key: &str) -> Result<(), String> {
    call("save_remote_config", to_args(&SaveConfigArgs { url, anon_key })?).await
}
