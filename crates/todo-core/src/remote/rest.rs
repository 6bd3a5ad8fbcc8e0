//! Items Table over REST
//!
//! `ItemRepository` backed by the hosted table API (`/rest/v1/<table>`).
//! Every request carries the signed-in user's token, so row-level policies
//! on the service apply on top of our own owner/id filters.

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use super::http::{ApiFailure, SupabaseHttp};
use super::{ItemRepository, TokenProvider};
use crate::domain::{Item, ItemId, ItemKey, NewItem, UserId};
use crate::error::QueryError;

pub struct RestItemRepository {
    http: SupabaseHttp,
    table: String,
    tokens: Arc<dyn TokenProvider>,
}

#[derive(Serialize)]
struct CompletedPatch {
    completed: bool,
}

fn network(e: reqwest::Error) -> QueryError {
    QueryError::Network(e.to_string())
}

impl RestItemRepository {
    pub fn new(http: SupabaseHttp, table: impl Into<String>, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            http,
            table: table.into(),
            tokens,
        }
    }

    fn table_url(&self) -> Url {
        self.http.endpoint(&format!("rest/v1/{}", self.table))
    }

    /// `?select=*&user_id=eq.<owner>&order=id.asc`
    pub(crate) fn list_url(&self, owner: &UserId) -> Url {
        let mut url = self.table_url();
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("user_id", &format!("eq.{}", owner))
            .append_pair("order", "id.asc");
        url
    }

    /// `?id=eq.<id>`
    pub(crate) fn row_url(&self, id: ItemId) -> Url {
        let mut url = self.table_url();
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));
        url
    }

    /// Request carrying a current token; an expiring session is refreshed first
    async fn authed(&self, method: Method, url: Url) -> Result<reqwest::RequestBuilder, QueryError> {
        let token = self.tokens.access_token().await.ok_or(QueryError::NotSignedIn)?;
        Ok(self.http.request(method, url, Some(&token)))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T, QueryError> {
        let response = request.send().await.map_err(network)?;
        if !response.status().is_success() {
            let failure = ApiFailure::from_response(response).await;
            return Err(QueryError::Status {
                status: failure.status,
                message: failure.message,
            });
        }
        let body = response.text().await.map_err(network)?;
        decode_rows(&body)
    }
}

pub(crate) fn decode_rows<T: DeserializeOwned>(body: &str) -> Result<T, QueryError> {
    serde_json::from_str(body).map_err(|e| QueryError::Decode(e.to_string()))
}

#[async_trait]
impl ItemRepository for RestItemRepository {
    async fn list_by_owner(&self, owner: &UserId) -> Result<Vec<Item>, QueryError> {
        let request = self.authed(Method::GET, self.list_url(owner)).await?;
        self.fetch(request).await
    }

    async fn insert(&self, item: &NewItem) -> Result<Item, QueryError> {
        let request = self
            .authed(Method::POST, self.table_url())
            .await?
            .header("Prefer", "return=representation")
            .json(&[item]);
        let rows: Vec<Item> = self.fetch(request).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| QueryError::Decode("insert returned no row".to_string()))
    }

    async fn set_completed(&self, id: ItemId, completed: bool) -> Result<Option<Item>, QueryError> {
        let request = self
            .authed(Method::PATCH, self.row_url(id))
            .await?
            .header("Prefer", "return=representation")
            .json(&CompletedPatch { completed });
        let rows: Vec<Item> = self.fetch(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, id: ItemId) -> Result<Option<ItemKey>, QueryError> {
        let request = self
            .authed(Method::DELETE, self.row_url(id))
            .await?
            .header("Prefer", "return=representation");
        let rows: Vec<Item> = self.fetch(request).await?;
        Ok(rows.into_iter().next().map(|row| row.key()))
    }
}
