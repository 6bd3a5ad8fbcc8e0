//! Item Commands
//!
//! Frontend bindings for the item list commands.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use super::{call, to_args};
use crate::models::{Item, ListSnapshot};

#[derive(Serialize)]
struct TextArgs<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct IdArgs {
    id: i64,
}

pub async fn attach_items() -> Result<ListSnapshot, String> {
    call("attach_items", JsValue::NULL).await
}

pub async fn detach_items() -> Result<(), String> {
    call("detach_items", JsValue::NULL).await
}

pub async fn reload_items() -> Result<ListSnapshot, String> {
    call("reload_items", JsValue::NULL).await
}

pub async fn create_item(text: &str) -> Result<Item, String> {
    call("create_item", to_args(&TextArgs { text })?).await
}

pub async fn toggle_item(id: i64) -> Result<Option<Item>, String> {
    call("toggle_item", to_args(&IdArgs { id })?).await
}

pub async fn delete_item(id: i64) -> Result<(), String> {
    call("delete_item", to_args(&IdArgs { id })?).await
}
