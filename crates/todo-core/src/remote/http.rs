//! HTTP Plumbing
//!
//! Shared reqwest client, endpoint building and decoding of the error bodies
//! returned by the auth and table APIs.

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;

use crate::config::RemoteConfig;
use crate::error::ConfigError;

/// Client bound to one project: base URL plus anon key
#[derive(Debug, Clone)]
pub struct SupabaseHttp {
    client: reqwest::Client,
    base: Url,
    anon_key: String,
}

impl SupabaseHttp {
    pub fn new(config: &RemoteConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            client: reqwest::Client::new(),
            base: config.base_url()?,
            anon_key: config.anon_key.trim().to_string(),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn anon_key(&self) -> &str {
        &self.anon_key
    }

    /// Absolute URL for a path relative to the project root (no leading slash)
    pub fn endpoint(&self, path: &str) -> Url {
        // `base` always ends with '/', and `path` is one of our own constants
        match self.base.join(path.trim_start_matches('/')) {
            Ok(url) => url,
            Err(_) => self.base.clone(),
        }
    }

    /// Request with the project's `apikey` header and a bearer token.
    ///
    /// Without a user token the anon key is sent as bearer, like the hosted SDKs do.
    pub fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        let token = bearer.unwrap_or(&self.anon_key);
        self.client
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }
}

/// Union of the error shapes used by the auth and table APIs
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Decoded failure response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    pub status: u16,
    /// Machine-readable code when the service sends one
    pub code: Option<String>,
    pub message: String,
}

impl ApiFailure {
    pub fn parse(status: StatusCode, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .msg
            .or(parsed.message)
            .or(parsed.error_description)
            .or_else(|| parsed.error.clone())
            .unwrap_or_else(|| {
                let trimmed = body.trim();
                if trimmed.is_empty() {
                    status.canonical_reason().unwrap_or("request failed").to_string()
                } else {
                    trimmed.to_string()
                }
            });
        Self {
            status: status.as_u16(),
            code: parsed.error_code.or(parsed.error),
            message,
        }
    }

    /// Read the failure out of a non-success response
    pub async fn from_response(response: Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::parse(status, &body)
    }
}
