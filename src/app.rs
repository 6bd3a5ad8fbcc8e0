//! Todo-Sync Frontend App
//!
//! Session gate: asks the backend where to go on load, then renders the
//! matching view. Toasts are app-wide and live above every view.

use leptos::prelude::*;
use leptos::task::spawn_local;
use reactive_stores::Store;

use crate::commands;
use crate::components::{SettingsForm, SignInForm, SignUpForm, ToastStack, TodoView, VerifyEmail};
use crate::context::AppContext;
use crate::models::Route;
use crate::store::AppState;

#[component]
pub fn App() -> impl IntoView {
    let store = Store::new(AppState::default());
    provide_context(store);

    let route = signal(Route::SignIn);
    let ctx = AppContext::new(route, store);
    provide_context(ctx);

    let (ready, set_ready) = signal(false);

    // Session gate on load
    spawn_local(async move {
        match commands::get_session().await {
            Ok(gate) => {
                ctx.email.set(gate.email);
                ctx.navigate(gate.route);
            }
            Err(e) => {
                web_sys::console::error_1(&format!("[APP] get_session failed: {}", e).into());
                ctx.navigate(Route::SignIn);
            }
        }
        set_ready.set(true);
    });

    // Backend toasts; the listener lives as long as the app
    spawn_local(async move {
        let listener = commands::listen_toasts(move |notification| ctx.toast(notification)).await;
        std::mem::forget(listener);
    });

    view! {
        <div class="app-layout">
            <main class="main-content">
                <Show
                    when=move || ready.get()
                    fallback=|| view! { <p class="loading">"Loading..."</p> }
                >
                    {move || match ctx.route.get() {
                        Route::Todos => view! { <TodoView /> }.into_any(),
                        Route::SignIn => view! { <SignInForm /> }.into_any(),
                        Route::SignUp => view! { <SignUpForm /> }.into_any(),
                        Route::VerifyEmail => view! { <VerifyEmail /> }.into_any(),
                        Route::Settings => view! { <SettingsForm /> }.into_any(),
                    }}
                </Show>
            </main>
            <ToastStack />
        </div>
    }
}
