//! Delete Confirm Button Component
//!
//! Inline delete confirmation with confirm/cancel actions.

use leptos::prelude::*;

/// Shows a × button; once clicked, asks "Delete?" with ✓/✗.
#[component]
pub fn DeleteConfirmButton(
    #[prop(into)] button_class: String,
    #[prop(into)] on_confirm: Callback<()>,
) -> impl IntoView {
    let (confirming, set_confirming) = signal(false);

    view! {
        <Show
            when=move || confirming.get()
            fallback=move || {
                let class = button_class.clone();
                view! {
                    <button
                        class=class
                        title="Delete"
                        on:click=move |ev| {
                            ev.stop_propagation();
                            set_confirming.set(true);
                        }
                    >
                        "×"
                    </button>
                }
            }
        >
            <span class="delete-confirm">
                <span class="delete-confirm-text">"Delete?"</span>
                <button
                    class="confirm-btn"
                    on:click=move |ev| {
                        ev.stop_propagation();
                        set_confirming.set(false);
                        on_confirm.run(());
                    }
                >
                    "✓"
                </button>
                <button
                    class="cancel-btn"
                    on:click=move |ev| {
                        ev.stop_propagation();
                        set_confirming.set(false);
                    }
                >
                    "✗"
                </button>
            </span>
        </Show>
    }
}
