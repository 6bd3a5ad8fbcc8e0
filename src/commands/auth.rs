//! Auth Commands
//!
//! Frontend bindings for the session gate and auth commands.

use serde::Serialize;
use wasm_bindgen::prelude::*;

use super::{call, to_args};
use crate::models::{GateView, User};

#[derive(Serialize)]
struct CredentialArgs<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct ResendArgs<'a> {
    email: Option<&'a str>,
}

pub async fn get_session() -> Result<GateView, String> {
    call("get_session", JsValue::NULL).await
}

pub async fn verification_route() -> Result<GateView, String> {
    call("verification_route", JsValue::NULL).await
}

pub async fn sign_in(email: &str, password: &str) -> Result<GateView, String> {
    call("sign_in", to_args(&CredentialArgs { email, password })?).await
}

pub async fn sign_up(email: &str, password: &str) -> Result<GateView, String> {
    call("sign_up", to_args(&CredentialArgs { email, password })?).await
}

pub async fn sign_out() -> Result<(), String> {
    call("sign_out", JsValue::NULL).await
}

pub async fn resend_verification(email: Option<&str>) -> Result<(), String> {
    call("resend_verification", to_args(&ResendArgs { email })?).await
}

pub async fn get_user() -> Result<User, String> {
    call("get_user", JsValue::NULL).await
}
