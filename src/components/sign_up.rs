//! Sign Up Form Component

use leptos::prelude::*;
use leptos::task::spawn_local;

use super::sign_in::input_value;
use crate::commands;
use crate::context::use_app_context;
use crate::models::Route;

#[component]
pub fn SignUpForm() -> impl IntoView {
    let ctx = use_app_context();

    let (email, set_email) = signal(String::new());
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
            match commands::sign_up(&email, &password).await {
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
            <h1>"Sign Up"</h1>
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
                {move || if pending.get() { "Signing Up..." } else { "Sign Up" }}
            </button>
            <p class="form-links">
                "Already have an account? "
                <a href="#" on:click=move |ev| {
                    ev.prevent_default();
                    ctx.navigate(Route::SignIn);
                }>"Sign In"</a>
            </p>
        </form>
    }
}
