//! Toast Stack Component
//!
//! Transient notifications, newest at the bottom. Click to dismiss.

use leptos::prelude::*;

use crate::models::NotificationLevel;
use crate::store::{store_dismiss_toast, use_app_store, AppStateStoreFields};

#[component]
pub fn ToastStack() -> impl IntoView {
    let store = use_app_store();

    view! {
        <div class="toast-stack">
            <For
                each=move || store.toasts().get()
                key=|toast| toast.id
                children=move |toast| {
                    let id = toast.id;
                    let class = match toast.notification.level {
                        NotificationLevel::Success => "toast toast-success",
                        NotificationLevel::Info => "toast toast-info",
                        NotificationLevel::Error => "toast toast-error",
                    };
                    view! {
                        <div class=class on:click=move |_| store_dismiss_toast(&store, id)>
                            {toast.notification.message}
                        </div>
                    }
                }
            />
        </div>
    }
}
