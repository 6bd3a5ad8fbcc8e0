//! Todo View Component
//!
//! The signed-in user's list. Attaches the backend list on mount, follows
//! `items-changed` while mounted and detaches on cleanup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use leptos::prelude::*;
use leptos::task::spawn_local;

use super::{NewItemForm, TodoRow};
use crate::commands::{self, EventListener};
use crate::context::use_app_context;
use crate::models::Route;
use crate::store::{store_apply_snapshot, store_clear_items, use_app_store, AppStateStoreFields};

#[component]
pub fn TodoView() -> impl IntoView {
    let ctx = use_app_context();
    let store = use_app_store();

    let alive = Arc::new(AtomicBool::new(true));
    let listener = StoredValue::new_local(None::<EventListener>);

    // Listen first so nothing published after the attach snapshot is missed
    {
        let alive = alive.clone();
        spawn_local(async move {
            let on_change = {
                let alive = alive.clone();
                move |snapshot| {
                    if alive.load(Ordering::SeqCst) {
                        store_apply_snapshot(&store, snapshot);
                    }
                }
            };
            let registered = commands::listen_items_changed(on_change).await;
            if !alive.load(Ordering::SeqCst) {
                registered.unlisten();
                return;
            }
            if let Some(Some(orphan)) = listener.try_set_value(Some(registered)) {
                orphan.unlisten();
            }

            match commands::attach_items().await {
                Ok(snapshot) if alive.load(Ordering::SeqCst) => store_apply_snapshot(&store, snapshot),
                Ok(_) => {}
                Err(e) => {
                    web_sys::console::error_1(&format!("[TODO] attach failed: {}", e).into());
                    if e == "Not signed in" {
                        ctx.navigate(Route::SignIn);
                        return;
                    }
                }
            }

            // Restored sessions open straight onto the list without an email
            if alive.load(Ordering::SeqCst) && ctx.email.get_untracked().is_none() {
                match commands::get_user().await {
                    Ok(user) if alive.load(Ordering::SeqCst) => ctx.email.set(user.email),
                    Ok(_) => {}
                    Err(e) => web_sys::console::error_1(&format!("[TODO] user lookup failed: {}", e).into()),
                }
            }
        });
    }

    on_cleanup({
        let alive = alive.clone();
        move || {
            alive.store(false, Ordering::SeqCst);
            if let Some(Some(registered)) = listener.try_update_value(|slot| slot.take()) {
                registered.unlisten();
            }
            spawn_local(async move {
                let _ = commands::detach_items().await;
            });
        }
    });

    let reload = move |_| {
        spawn_local(async move {
            match commands::reload_items().await {
                Ok(snapshot) => store_apply_snapshot(&store, snapshot),
                Err(e) => web_sys::console::error_1(&format!("[TODO] reload failed: {}", e).into()),
            }
        });
    };

    let sign_out = move |_| {
        spawn_local(async move {
            if let Err(e) = commands::sign_out().await {
                web_sys::console::error_1(&format!("[TODO] sign out failed: {}", e).into());
            }
            store_clear_items(&store);
            ctx.email.set(None);
            ctx.navigate(Route::SignIn);
        });
    };

    view! {
        <div class="todo-view">
            <header class="todo-header">
                <h1>"Todos"</h1>
                <span class="user-email">{move || ctx.email.get().unwrap_or_default()}</span>
                <button class="sign-out-btn" on:click=sign_out>"Sign Out"</button>
            </header>

            <NewItemForm />

            {move || {
                if store.loading().get() {
                    view! { <p class="loading">"Loading..."</p> }.into_any()
                } else if let Some(error) = store.error().get() {
                    view! {
                        <div class="list-error">
                            <p>{error}</p>
                            <button on:click=reload>"Retry"</button>
                        </div>
                    }
                    .into_any()
                } else if store.items().read().is_empty() {
                    view! { <p class="empty">"Nothing to do."</p> }.into_any()
                } else {
                    view! {
                        <ul class="todo-list">
                            <For
                                each=move || store.items().get()
                                key=|item| (item.id, item.completed, item.text.clone())
                                children=move |item| view! { <TodoRow item=item /> }
                            />
                        </ul>
                    }
                    .into_any()
                }
            }}
        </div>
    }
}
