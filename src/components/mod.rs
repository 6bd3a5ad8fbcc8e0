//! UI Components
//!
//! Leptos views for the session gate routes and the item list.

mod sign_in;
mod sign_up;
mod verify_email;
mod settings_form;
mod todo_view;
mod todo_row;
mod new_item_form;
mod delete_confirm_button;
mod toast_stack;

pub use sign_in::SignInForm;
pub use sign_up::SignUpForm;
pub use verify_email::VerifyEmail;
pub use settings_form::SettingsForm;
pub use todo_view::TodoView;
pub use todo_row::TodoRow;
pub use new_item_form::NewItemForm;
pub use delete_confirm_button::DeleteConfirmButton;
pub use toast_stack::ToastStack;
