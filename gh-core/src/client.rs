//! Thin REST and GraphQL client wrappers over a shared `reqwest::Client`.
//!
//! Plain reqwest, no code-gen client, with a GraphQL sibling since this
//! controller also needs comment-minimization mutations that GitHub's
//! REST v3 API doesn't expose.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::errors::{GhError, GhResult};
use crate::metrics;

/// REST (v3) client bound to one GitHub principal (installation or PAT).
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_api: String,
    auth_header: String,
    /// Label used for the `gh_api_calls_total{owner,status}` /
    /// `gh_rate_limit_*{owner}` metrics. Empty for clients
    /// built without going through the registry (e.g. unit tests).
    owner: String,
}

impl RestClient {
    pub fn new(http: reqwest::Client, base_api: String, auth_header: String) -> Self {
        Self {
            http,
            base_api,
            auth_header,
            owner: String::new(),
        }
    }

    /// Tags every subsequent call's metrics with `owner`.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub fn base_api(&self) -> &str {
        &self.base_api
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_api, path);
        debug!(%method, %url, "github rest call");
        self.http
            .request(method, url)
            .header("Authorization", &self.auth_header)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "telefonistka-controller")
    }

    /// GET returning typed JSON, or `None` on 404.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> GhResult<Option<T>> {
        let resp = self.request(reqwest::Method::GET, path).send().await?;
        self.decode_optional(resp).await
    }

    /// GET with query params, returning typed JSON, or `None` on 404.
    pub async fn get_json_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> GhResult<Option<T>> {
        let resp = self
            .request(reqwest::Method::GET, path)
            .query(query)
            .send()
            .await?;
        self.decode_optional(resp).await
    }

    /// GET raw body bytes (used for the `.raw` content negotiation), or
    /// `None` on 404.
    pub async fn get_raw(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> GhResult<Option<(u16, Vec<u8>)>> {
        let resp = self
            .request(reqwest::Method::GET, path)
            .query(query)
            .header("Accept", "application/vnd.github.v3.raw")
            .send()
            .await?;
        let status = resp.status().as_u16();
        if status == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GhError::Api { status, body });
        }
        let bytes = resp.bytes().await?.to_vec();
        Ok(Some((status, bytes)))
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> GhResult<T> {
        let resp = self
            .request(reqwest::Method::POST, path)
            .json(body)
            .send()
            .await?;
        self.decode_required(resp).await
    }

    pub async fn put_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> GhResult<T> {
        let resp = self
            .request(reqwest::Method::PUT, path)
            .json(body)
            .send()
            .await?;
        self.decode_required(resp).await
    }

    pub async fn patch_no_body(&self, path: &str) -> GhResult<Value> {
        let resp = self.request(reqwest::Method::PATCH, path).send().await?;
        self.decode_required(resp).await
    }

    async fn decode_optional<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> GhResult<Option<T>> {
        let status = resp.status();
        metrics::observe_response(&self.owner, status.as_u16(), resp.headers());
        if status.as_u16() == 404 {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GhError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let value = resp.json::<T>().await?;
        Ok(Some(value))
    }

    async fn decode_required<T: DeserializeOwned>(&self, resp: reqwest::Response) -> GhResult<T> {
        let status = resp.status();
        metrics::observe_response(&self.owner, status.as_u16(), resp.headers());
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GhError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let value = resp.json::<T>().await?;
        Ok(value)
    }

    /// Returns just the status code for calls where the body is irrelevant
    /// (e.g. probing whether a path exists).
    pub async fn head_status(&self, path: &str) -> GhResult<u16> {
        let resp = self.request(reqwest::Method::GET, path).send().await?;
        Ok(resp.status().as_u16())
    }
}

/// GraphQL (v4) client bound to the same principal as a sibling `RestClient`.
#[derive(Debug, Clone)]
pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: String,
    auth_header: String,
}

impl GraphQlClient {
    pub fn new(http: reqwest::Client, endpoint: String, auth_header: String) -> Self {
        Self {
            http,
            endpoint,
            auth_header,
        }
    }

    pub async fn query(&self, query: &str, variables: Value) -> GhResult<Value> {
        let body = serde_json::json!({ "query": query, "variables": variables });
        let resp = self
            .http
            .post(&self.endpoint)
            .header("Authorization", &self.auth_header)
            .header("User-Agent", "telefonistka-controller")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(GhError::Api { status, body: text });
        }

        let payload: Value = resp.json().await?;
        if let Some(errors) = payload.get("errors") {
            return Err(GhError::GraphQl(errors.to_string()));
        }
        Ok(payload
            .get("data")
            .cloned()
            .unwrap_or(Value::Null))
    }
}

/// A REST+GraphQL pair sharing one GitHub principal's identity.
#[derive(Debug, Clone)]
pub struct ClientPair {
    pub rest: RestClient,
    pub graphql: GraphQlClient,
}
