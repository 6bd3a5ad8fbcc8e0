//! Session Entity
//!
//! Authenticated session as issued by the hosted auth service.

use serde::{Deserialize, Serialize};

use super::item::UserId;

/// Seconds before expiry at which a session is treated as expired
pub const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub email_confirmed_at: Option<String>,
}

impl User {
    pub fn is_confirmed(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Unix timestamp (seconds)
    pub expires_at: i64,
    pub user: User,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl Session {
    pub fn user_id(&self) -> &UserId {
        &self.user.id
    }

    /// True if the access token expires within the safety margin of `now`
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at - EXPIRY_MARGIN_SECS <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }
}

/// Result of a sign-up request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignUpOutcome {
    /// The project auto-confirms accounts and issued a session right away
    SignedIn { session: Session },
    /// A verification email was sent
    NeedsVerification { email: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(expires_at: i64) -> Session {
        Session {
            access_token: "a".into(),
            refresh_token: "r".into(),
            token_type: "bearer".into(),
            expires_at,
            user: User {
                id: UserId::from("u1"),
                email: Some("m@example.com".into()),
                email_confirmed_at: None,
            },
        }
    }

    #[test]
    fn test_expiry_margin() {
        assert!(!session(1_000).is_expired_at(900));
        assert!(session(1_000).is_expired_at(940));
        assert!(session(1_000).is_expired_at(2_000));
    }

    #[test]
    fn test_unconfirmed_user() {
        assert!(!session(0).user.is_confirmed());
    }
}
