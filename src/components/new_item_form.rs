//! New Item Form Component
//!
//! Single-line form for adding an item to the list.

use leptos::prelude::*;
use leptos::task::spawn_local;

use super::sign_in::input_value;
use crate::commands;

#[component]
pub fn NewItemForm() -> impl IntoView {
    let (new_text, set_new_text) = signal(String::new());
    let (adding, set_adding) = signal(false);

    let create_item = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        let text = new_text.get();
        if text.trim().is_empty() || adding.get() {
            return;
        }
        set_adding.set(true);

        spawn_local(async move {
            // The list itself updates through `items-changed`; failures arrive as toasts
            if commands::create_item(&text).await.is_ok() {
                set_new_text.set(String::new());
            }
            set_adding.set(false);
        });
    };

    view! {
        <form class="new-item-form" on:submit=create_item>
            <div class="new-item-row">
                <input
                    type="text"
                    placeholder="What needs to be done?"
                    prop:value=move || new_text.get()
                    on:input=move |ev| set_new_text.set(input_value(&ev))
                />
                <button type="submit" disabled=move || adding.get()>"Add"</button>
            </div>
        </form>
    }
}
