//! Backend Events
//!
//! `items-changed` and `toast`, emitted by the backend presenter.

use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use super::listen;
use crate::models::{ListSnapshot, Notification};

pub const ITEMS_CHANGED_EVENT: &str = "items-changed";
pub const TOAST_EVENT: &str = "toast";

/// A registered event handler. Stays registered until `unlisten`.
pub struct EventListener {
    _handler: Closure<dyn FnMut(JsValue)>,
    unlisten: js_sys::Function,
}

impl EventListener {
    pub fn unlisten(self) {
        let _ = self.unlisten.call0(&JsValue::NULL);
    }
}

async fn listen_to<T: DeserializeOwned + 'static>(
    event: &'static str,
    mut on_event: impl FnMut(T) + 'static,
) -> EventListener {
    let handler = Closure::<dyn FnMut(JsValue)>::new(move |ev: JsValue| {
        let payload = js_sys::Reflect::get(&ev, &JsValue::from_str("payload")).unwrap_or(JsValue::NULL);
        match serde_wasm_bindgen::from_value::<T>(payload) {
            Ok(value) => on_event(value),
            Err(e) => web_sys::console::error_1(&format!("[EVENTS] Bad {} payload: {}", event, e).into()),
        }
    });
    let unlisten = listen(event, &handler).await;
    EventListener {
        _handler: handler,
        unlisten: unlisten.unchecked_into(),
    }
}

pub async fn listen_items_changed(on_event: impl FnMut(ListSnapshot) + 'static) -> EventListener {
    listen_to(ITEMS_CHANGED_EVENT, on_event).await
}

pub async fn listen_toasts(on_event: impl FnMut(Notification) + 'static) -> EventListener {
    listen_to(TOAST_EVENT, on_event).await
}
