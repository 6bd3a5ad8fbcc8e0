//! Auth Client
//!
//! Password sign-up/sign-in, token refresh, sign-out and verification mails
//! against the hosted auth REST API (`/auth/v1`).

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::http::{ApiFailure, SupabaseHttp};
use super::AuthApi;
use crate::domain::{Session, SignUpOutcome, User};
use crate::error::AuthError;

pub struct GoTrueClient {
    http: SupabaseHttp,
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshArgs<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct ResendArgs<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    email: &'a str,
}

/// Token grant response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: User,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| now + self.expires_in.unwrap_or(3600));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            expires_at,
            user: self.user,
        }
    }
}

/// Sign-up returns a full token response when the project auto-confirms,
/// otherwise just the (unconfirmed) user
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    User(User),
}

pub(crate) fn decode_sign_up(body: &str, email: &str, now: i64) -> Result<SignUpOutcome, AuthError> {
    let parsed: SignUpResponse = serde_json::from_str(body).map_err(|e| AuthError::Decode(e.to_string()))?;
    Ok(match parsed {
        SignUpResponse::Session(token) => SignUpOutcome::SignedIn {
            session: token.into_session(now),
        },
        SignUpResponse::User(user) => SignUpOutcome::NeedsVerification {
            email: user.email.unwrap_or_else(|| email.to_string()),
        },
    })
}

pub(crate) fn decode_session(body: &str, now: i64) -> Result<Session, AuthError> {
    let token: TokenResponse = serde_json::from_str(body).map_err(|e| AuthError::Decode(e.to_string()))?;
    Ok(token.into_session(now))
}

/// Map an auth failure onto the error taxonomy
pub(crate) fn classify(failure: ApiFailure) -> AuthError {
    let code = failure.code.as_deref().unwrap_or_default();
    let lowered = failure.message.to_lowercase();
    if code == "email_not_confirmed" || lowered.contains("email not confirmed") {
        AuthError::EmailNotConfirmed
    } else if code == "invalid_credentials"
        || (code == "invalid_grant" && lowered.contains("invalid login credentials"))
    {
        AuthError::InvalidCredentials
    } else {
        AuthError::Rejected {
            status: failure.status,
            message: failure.message,
        }
    }
}

fn network(e: reqwest::Error) -> AuthError {
    AuthError::Network(e.to_string())
}

impl GoTrueClient {
    pub fn new(http: SupabaseHttp) -> Self {
        Self { http }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<String, AuthError> {
        let response = request.send().await.map_err(network)?;
        if !response.status().is_success() {
            return Err(classify(ApiFailure::from_response(response).await));
        }
        response.text().await.map_err(network)
    }

    async fn token_grant<T: Serialize + ?Sized>(&self, grant_type: &str, body: &T) -> Result<Session, AuthError> {
        let mut url = self.http.endpoint("auth/v1/token");
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        let body = self
            .send(self.http.request(Method::POST, url, None).json(body))
            .await?;
        decode_session(&body, chrono::Utc::now().timestamp())
    }
}

#[async_trait]
impl AuthApi for GoTrueClient {
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
        let url = self.http.endpoint("auth/v1/signup");
        let body = self
            .send(
                self.http
                    .request(Method::POST, url, None)
                    .json(&Credentials { email, password }),
            )
            .await?;
        decode_sign_up(&body, email, chrono::Utc::now().timestamp())
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        self.token_grant("password", &Credentials { email, password }).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        self.token_grant("refresh_token", &RefreshArgs { refresh_token }).await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let url = self.http.endpoint("auth/v1/logout");
        self.send(self.http.request(Method::POST, url, Some(access_token)))
            .await
            .map(|_| ())
    }

    async fn get_user(&self, access_token: &str) -> Result<User, AuthError> {
        let url = self.http.endpoint("auth/v1/user");
        let body = self
            .send(self.http.request(Method::GET, url, Some(access_token)))
            .await?;
        serde_json::from_str(&body).map_err(|e| AuthError::Decode(e.to_string()))
    }

    async fn resend_verification(&self, email: &str) -> Result<(), AuthError> {
        let url = self.http.endpoint("auth/v1/resend");
        self.send(
            self.http
                .request(Method::POST, url, None)
                .json(&ResendArgs { kind: "signup", email }),
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    const USER: &str = r#"{"id":"8d0fd2b3","aud":"authenticated","email":"m@example.com","email_confirmed_at":null,"confirmation_sent_at":"2024-05-01T10:00:00Z"}"#;

    #[test]
    fn test_decode_session_with_expires_at() {
        let body = format!(
            r#"{{"access_token":"at","token_type":"bearer","expires_in":3600,"expires_at":1700003600,"refresh_token":"rt","user":{}}}"#,
            USER
        );
        let session = decode_session(&body, 0).unwrap();
        assert_eq!(session.access_token, "at");
        assert_eq!(session.expires_at, 1_700_003_600);
        assert_eq!(session.user.id.as_str(), "8d0fd2b3");
    }

    #[test]
    fn test_decode_session_computes_expiry() {
        let body = format!(r#"{{"access_token":"at","expires_in":60,"refresh_token":"rt","user":{}}}"#, USER);
        let session = decode_session(&body, 1_000).unwrap();
        assert_eq!(session.expires_at, 1_060);
        assert_eq!(session.token_type, "bearer");
    }

    #[test]
    fn test_sign_up_needs_verification() {
        let outcome = decode_sign_up(USER, "typed@example.com", 0).unwrap();
        assert_eq!(
            outcome,
            SignUpOutcome::NeedsVerification {
                email: "m@example.com".into()
            }
        );
    }

    #[test]
    fn test_sign_up_auto_confirmed() {
        let body = format!(r#"{{"access_token":"at","expires_in":60,"refresh_token":"rt","user":{}}}"#, USER);
        assert!(matches!(
            decode_sign_up(&body, "m@example.com", 0).unwrap(),
            SignUpOutcome::SignedIn { .. }
        ));
    }

    #[test]
    fn test_classify_errors() {
        let invalid = ApiFailure::parse(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(classify(invalid), AuthError::InvalidCredentials);

        let unconfirmed = ApiFailure::parse(
            StatusCode::BAD_REQUEST,
            r#"{"code":400,"error_code":"email_not_confirmed","msg":"Email not confirmed"}"#,
        );
        assert_eq!(classify(unconfirmed), AuthError::EmailNotConfirmed);

        let taken = ApiFailure::parse(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"code":422,"error_code":"user_already_exists","msg":"User already registered"}"#,
        );
        assert_eq!(
            classify(taken),
            AuthError::Rejected {
                status: 422,
                message: "User already registered".into()
            }
        );
    }
}
