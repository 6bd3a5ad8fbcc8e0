//! Verify Email Component
//!
//! Shown after sign-up until the address is confirmed. Steps aside to the
//! list as soon as a session exists.

use leptos::prelude::*;
use leptos::task::spawn_local;

use crate::commands;
use crate::context::use_app_context;
use crate::models::Route;

#[component]
pub fn VerifyEmail() -> impl IntoView {
    let ctx = use_app_context();

    let (message, set_message) = signal::<Option<Result<String, String>>>(None);
    let (pending, set_pending) = signal(false);

    // A session may already exist (e.g. auto-confirmed project)
    spawn_local(async move {
        if let Ok(gate) = commands::verification_route().await {
            if gate.email.is_some() {
                ctx.email.set(gate.email);
            }
            if gate.route == Route::Todos {
                ctx.navigate(Route::Todos);
            }
        }
    });

    let resend = move |_| {
        set_pending.set(true);
        let email = ctx.email.get();
        spawn_local(async move {
            let result = commands::resend_verification(email.as_deref()).await;
            set_message.set(Some(
                result.map(|_| "Verification email sent. Please check your inbox.".to_string()),
            ));
            set_pending.set(false);
        });
    };

    view! {
        <div class="verify-card">
            <h1>"Check your email"</h1>
            <p>
                "We sent a verification link to "
                <strong>{move || ctx.email.get().unwrap_or_else(|| "your email address".to_string())}</strong>
                ". Follow it, then sign in."
            </p>
            {move || message.get().map(|m| match m {
                Ok(text) => view! { <p class="form-success">{text}</p> }.into_any(),
                Err(text) => view! { <p class="form-error">{text}</p> }.into_any(),
            })}
            <button on:click=resend disabled=move || pending.get()>
                {move || if pending.get() { "Sending..." } else { "Resend verification email" }}
            </button>
            <button class="link-btn" on:click=move |_| ctx.navigate(Route::SignIn)>
                "Back to Sign In"
            </button>
        </div>
    }
}
