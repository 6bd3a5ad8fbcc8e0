//! Application Context
//!
//! Shared state provided via Leptos Context API.

use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::models::{Notification, Route};
use crate::store::{store_dismiss_toast, store_push_toast, AppStore};

/// How long a toast stays up (ms)
const TOAST_MILLIS: u32 = 3_000;

/// App-wide signals provided via context
#[derive(Clone, Copy)]
pub struct AppContext {
    /// Current view - read
    pub route: ReadSignal<Route>,
    /// Current view - write
    set_route: WriteSignal<Route>,
    /// Address of the signed-in or just-registered user
    pub email: RwSignal<Option<String>>,
    store: AppStore,
}

impl AppContext {
    pub fn new(route: (ReadSignal<Route>, WriteSignal<Route>), store: AppStore) -> Self {
        Self {
            route: route.0,
            set_route: route.1,
            email: RwSignal::new(None),
            store,
        }
    }

    pub fn navigate(&self, route: Route) {
        web_sys::console::log_1(&format!("[APP] Route -> {:?}", route).into());
        self.set_route.set(route);
    }

    /// Show a toast that dismisses itself
    pub fn toast(&self, notification: Notification) {
        let store = self.store;
        let id = store_push_toast(&store, notification);
        spawn_local(async move {
            gloo_timers::future::TimeoutFuture::new(TOAST_MILLIS).await;
            store_dismiss_toast(&store, id);
        });
    }
}

pub fn use_app_context() -> AppContext {
    expect_context::<AppContext>()
}
