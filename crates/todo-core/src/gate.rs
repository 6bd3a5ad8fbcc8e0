//! Session Gate
//!
//! Decides which view the app shows: the list for a signed-in user, the
//! sign-in form otherwise, and the connection settings while no remote
//! service is configured.

use serde::{Deserialize, Serialize};

use crate::domain::{Session, SignUpOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Todos,
    SignIn,
    VerifyEmail,
    SignUp,
    Settings,
}

pub fn route_for(session: Option<&Session>) -> Route {
    match session {
        Some(_) => Route::Todos,
        None => Route::SignIn,
    }
}

/// Route on app start
pub fn initial_route(configured: bool, session: Option<&Session>) -> Route {
    if !configured {
        return Route::Settings;
    }
    route_for(session)
}

pub fn route_after_sign_up(outcome: &SignUpOutcome) -> Route {
    match outcome {
        SignUpOutcome::SignedIn { .. } => Route::Todos,
        SignUpOutcome::NeedsVerification { .. } => Route::VerifyEmail,
    }
}

/// The verify-email card steps aside once a session shows up
pub fn verify_email_route(session: Option<&Session>) -> Route {
    match session {
        Some(_) => Route::Todos,
        None => Route::VerifyEmail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{User, UserId};

    fn session() -> Session {
        Session {
            access_token: "a".into(),
            refresh_token: "r".into(),
            token_type: "bearer".into(),
            expires_at: 0,
            user: User {
                id: UserId::from("u1"),
                email: None,
                email_confirmed_at: None,
            },
        }
    }

    #[test]
    fn test_route_for_session() {
        assert_eq!(route_for(Some(&session())), Route::Todos);
        assert_eq!(route_for(None), Route::SignIn);
    }

    #[test]
    fn test_unconfigured_goes_to_settings() {
        assert_eq!(initial_route(false, Some(&session())), Route::Settings);
        assert_eq!(initial_route(true, None), Route::SignIn);
    }

    #[test]
    fn test_sign_up_routes() {
        let pending = SignUpOutcome::NeedsVerification { email: "m@example.com".into() };
        assert_eq!(route_after_sign_up(&pending), Route::VerifyEmail);
        let signed_in = SignUpOutcome::SignedIn { session: session() };
        assert_eq!(route_after_sign_up(&signed_in), Route::Todos);
    }

    #[test]
    fn test_verify_email_with_session() {
        assert_eq!(verify_email_route(Some(&session())), Route::Todos);
        assert_eq!(verify_email_route(None), Route::VerifyEmail);
    }

    #[test]
    fn test_route_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Route::VerifyEmail).unwrap(), "\"verify_email\"");
    }
}
