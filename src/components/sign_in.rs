//! Sign In Form Component
//!
//! Email/password form; errors render inline.

use leptos::prelude::*;
use leptos::task::spawn_local;
use wasm_bindgen::JsCast;

use crate::commands;
use crate::context::use_app_context;
use crate::models::Route;

/// Read the value of the input behind an input event
pub(crate) fn input_value(ev: &web_sys::Event) -> String {
    ev.target()
        .and_then(|target| target.dyn_into::<web_sys::HtmlInputElement>().ok())
        .map(|input| input.value())
        .unwrap_or_default()
}

#[component]
pub fn SignInForm() -> impl IntoView {
    let ctx = use_app_context();

    let (email, set_email) = signal(ctx.email.get_untracked().unwrap_or_default());
    let (password, set_password) = signal(String::new());
    let (error, set_error) = signal::<Option<String>>(None);
    let (pending, set_pending) = signal(false);

    let submit = move |ev: web_sys::SubmitEvent| {
        ev.prevent_default();
        if pending.get() {
            return;
        }
        set_pending.set(true);
        set_error.set(None);
        let email = email.get();
        let password = password.get();

        spawn_local(async move {
            match commands::sign_in(&email, &password).await {
                Ok(gate) => {
                    ctx.email.set(gate.email);
                    ctx.navigate(gate.route);
                }
                Err(e) => {
                    set_error.set(Some(e));
                    set_pending.set(false);
                }
            }
        });
    };

    view! {
        <form class="auth-form" on:submit=submit>
            <h1>"Sign In"</h1>
            <input
                type="email"
                placeholder="Email"
                required=true
                prop:value=move || email.get()
                on:input=move |ev| set_email.set(input_value(&ev))
            />
            <input
                type="password"
                placeholder="Password"
                required=true
                prop:value=move || password.get()
                on:input=move |ev| set_password.set(input_value(&ev))
            />
            {move || error.get().map(|e| view! { <p class="form-error">{e}</p> })}
            <button type="submit" disabled=move || pending.get()>
                {move || if pending.get() { "Signing In..." } else { "Sign In" }}
            </button>
            <p class="form-links">
                "Don't have an account? "
                <a href="#" on:click=move |ev| {
                    ev.prevent_default();
                    ctx.navigate(Route::SignUp);
                }>"Sign Up"</a>
                " · "
                <a href="#" on:click=move |ev| {
                    ev.prevent_default();
                    ctx.navigate(Route::Settings);
                }>"Settings"</a>
            </p>
        </form>
    }
}
