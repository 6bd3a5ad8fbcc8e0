//! Todo Row Component

use leptos::prelude::*;
use leptos::task::spawn_local;
use wasm_bindgen::JsCast;

use super::DeleteConfirmButton;
use crate::commands;
use crate::models::Item;

fn event_checked(ev: &web_sys::Event) -> bool {
    ev.target()
        .and_then(|target| target.dyn_into::<web_sys::HtmlInputElement>().ok())
        .map(|input| input.checked())
        .unwrap_or_default()
}

/// Box state once a toggle settles. A failed write shows the stored flag again;
/// a successful one keeps what was clicked until the list event replaces the row.
fn settled_checked(shown: bool, stored: bool, outcome: &Result<(), String>) -> bool {
    match outcome {
        Ok(()) => shown,
        Err(_) => stored,
    }
}

#[component]
pub fn TodoRow(item: Item) -> impl IntoView {
    let id = item.id;
    let completed = item.completed;
    let checked = RwSignal::new(completed);

    let toggle = move |ev: web_sys::Event| {
        checked.set(event_checked(&ev));
        spawn_local(async move {
            let outcome = commands::toggle_item(id).await.map(|_| ());
            if let Err(e) = &outcome {
                web_sys::console::error_1(&format!("[TODO] toggle #{} failed: {}", id, e).into());
            }
            checked.try_update(|shown| *shown = settled_checked(*shown, completed, &outcome));
        });
    };

    let remove = Callback::new(move |_: ()| {
        spawn_local(async move {
            if let Err(e) = commands::delete_item(id).await {
                web_sys::console::error_1(&format!("[TODO] delete #{} failed: {}", id, e).into());
            }
        });
    });

    view! {
        <li class=if completed { "todo-row completed" } else { "todo-row" }>
            <label class="todo-label">
                <input type="checkbox" prop:checked=checked on:change=toggle />
                <span class="todo-text">{item.text}</span>
            </label>
            <DeleteConfirmButton button_class="delete-btn" on_confirm=remove />
        </li>
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_toggle_restores_stored_state() {
        let failed = Err("network down".to_string());
        assert!(!settled_checked(true, false, &failed));
        assert!(settled_checked(false, true, &failed));
    }

    #[test]
    fn test_successful_toggle_keeps_clicked_state() {
        assert!(settled_checked(true, false, &Ok(())));
    }
}
