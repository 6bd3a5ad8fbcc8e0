//! Settings Form Component
//!
//! Project URL and anon key of the hosted backend.

use leptos::prelude::*;
use leptos::task::spawn_local;

use super::sign_in::input_value;
use crate::commands;
use crate::context::use_app_context;

#[component]
pub fn SettingsForm() -> impl IntoView {
    let ctx = use_app_context();

    let (url, set_url) = signal(String::new());
    let (anon_key, set_anon_key) = signal(String::new());
    let (error, set_error) = signal::<Option<String>>(None);
    let (saving, set_saving) = signal(false);

    spawn_local(async move {
        if let Ok(Some(config)) = commands::get_remote_config().await {
            set_url.set(config.url);
            set_anon_key.set(config.anon_key);
        }
    });

    let save = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        set_saving.set(true);
        set_error.set(None);
        let url = url.get();
        let anon_key = anon_key.get();

        spawn_local(async move {
            let result = match commands::save_remote_config(&url, &anon_key).await {
                Ok(()) => commands::get_session().await,
                Err(e) => Err(e),
            };
            match result {
                Ok(gate) => ctx.navigate(gate.route),
                Err(e) => set_error.set(Some(e)),
            }
            set_saving.set(false);
        });
    };

    view! {
        <form class="auth-form" on:submit=save>
            <h1>"Connection"</h1>
            <input
                type="url"
                placeholder="https://your-project.supabase.co"
                prop:value=move || url.get()
                on:input=move |ev| set_url.set(input_value(&ev))
            />
            <input
                type="text"
                placeholder="Anon key"
                prop:value=move || anon_key.get()
                on:input=move |ev| set_anon_key.set(input_value(&ev))
            />
            {move || error.get().map(|e| view! { <p class="form-error">{e}</p> })}
            <button type="submit" disabled=move || saving.get()>
                {move || if saving.get() { "Saving..." } else { "Save" }}
            </button>
        </form>
    }
}
