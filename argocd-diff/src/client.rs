//! ArgoCD server client: a thin `reqwest` wrapper behind a
//! trait, mirroring `gh_core::RestClient`'s shape so the orchestrator can
//! be unit-tested against a fake implementation without a live ArgoCD
//! instance.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::errors::{ArgoError, ArgoResult};
use crate::types::{Application, ApplicationSet, ManagedResource};

#[async_trait]
pub trait ArgoCdClient: Send + Sync {
    async fn list_applications(&self, repo_url_filter: Option<&str>) -> ArgoResult<Vec<Application>>;
    async fn list_applications_by_label(&self, label: &str, value: &str) -> ArgoResult<Vec<Application>>;
    async fn get_application(&self, name: &str) -> ArgoResult<Option<Application>>;
    async fn list_application_sets(&self) -> ArgoResult<Vec<ApplicationSet>>;
    async fn hard_refresh(&self, name: &str) -> ArgoResult<()>;
    async fn managed_resources(&self, name: &str) -> ArgoResult<Vec<ManagedResource>>;
    async fn desired_manifests(&self, name: &str, revision: &str) -> ArgoResult<Vec<ManagedResource>>;
    async fn create_application(&self, app: &Application) -> ArgoResult<()>;
    async fn delete_application(&self, name: &str) -> ArgoResult<()>;
    async fn set_target_revision(&self, name: &str, revision: &str) -> ArgoResult<()>;
    fn instance_url(&self) -> &str;
}

/// HTTP-backed client hitting `argocd-server`'s REST API directly (no
/// `grpc-web`), matching the rest of this controller's plain-`reqwest`
/// style (`gh_core::RestClient`).
#[derive(Debug, Clone)]
pub struct HttpArgoCdClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpArgoCdClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Builds a client from `ARGOCD_SERVER_ADDR` / `ARGOCD_TOKEN` /
    /// `ARGOCD_PLAINTEXT` / `ARGOCD_INSECURE`.
    pub fn from_env() -> ArgoResult<Self> {
        let addr = std::env::var("ARGOCD_SERVER_ADDR").unwrap_or_default();
        let token = std::env::var("ARGOCD_TOKEN").unwrap_or_default();
        let plaintext = std::env::var("ARGOCD_PLAINTEXT").is_ok();
        let insecure = std::env::var("ARGOCD_INSECURE").is_ok();
        let scheme = if plaintext { "http" } else { "https" };

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(insecure)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self::new(http, format!("{scheme}://{addr}"), token))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "argocd call");
        self.http.request(method, url).bearer_auth(&self.token)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> ArgoResult<Option<T>> {
        let resp = self.request(reqwest::Method::GET, path).send().await?;
        if resp.status().as_u16() == 404 {
            return Ok(None);
        }
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ArgoError::Api { status, body });
        }
        Ok(Some(resp.json::<T>().await?))
    }
}

#[derive(serde::Deserialize)]
struct AppList {
    items: Vec<Application>,
}

#[derive(serde::Deserialize)]
struct AppSetList {
    items: Vec<ApplicationSet>,
}

#[derive(serde::Deserialize)]
struct ManagedResourcesResponse {
    items: Vec<ManagedResource>,
}

#[derive(serde::Deserialize)]
struct ManifestsResponse {
    manifests: Vec<String>,
}

#[async_trait]
impl ArgoCdClient for HttpArgoCdClient {
    async fn list_applications(&self, repo_url_filter: Option<&str>) -> ArgoResult<Vec<Application>> {
        let path = match repo_url_filter {
            Some(repo) => format!("/api/v1/applications?repo={}", urlencoding_encode(repo)),
            None => "/api/v1/applications".to_string(),
        };
        let list: AppList = self.get_json(&path).await?.unwrap_or(AppList { items: vec![] });
        Ok(list.items)
    }

    async fn list_applications_by_label(&self, label: &str, value: &str) -> ArgoResult<Vec<Application>> {
        let selector = format!("{label}={value}");
        let path = format!(
            "/api/v1/applications?selector={}",
            urlencoding_encode(&selector)
        );
        let list: AppList = self.get_json(&path).await?.unwrap_or(AppList { items: vec![] });
        Ok(list.items)
    }

    async fn get_application(&self, name: &str) -> ArgoResult<Option<Application>> {
        self.get_json(&format!("/api/v1/applications/{name}")).await
    }

    async fn list_application_sets(&self) -> ArgoResult<Vec<ApplicationSet>> {
        let list: AppSetList = self
            .get_json("/api/v1/applicationsets")
            .await?
            .unwrap_or(AppSetList { items: vec![] });
        Ok(list.items)
    }

    async fn hard_refresh(&self, name: &str) -> ArgoResult<()> {
        let _: Option<Application> = self
            .get_json(&format!("/api/v1/applications/{name}?refresh=hard"))
            .await?;
        Ok(())
    }

    async fn managed_resources(&self, name: &str) -> ArgoResult<Vec<ManagedResource>> {
        let resp: ManagedResourcesResponse = self
            .get_json(&format!("/api/v1/applications/{name}/managed-resources"))
            .await?
            .unwrap_or(ManagedResourcesResponse { items: vec![] });
        Ok(resp.items)
    }

    async fn desired_manifests(&self, name: &str, revision: &str) -> ArgoResult<Vec<ManagedResource>> {
        let path = format!(
            "/api/v1/applications/{name}/manifests?revision={}",
            urlencoding_encode(revision)
        );
        let resp: ManifestsResponse = self
            .get_json(&path)
            .await?
            .unwrap_or(ManifestsResponse { manifests: vec![] });
        // Desired manifests arrive as raw YAML/JSON strings; normalize them
        // into the same shape managed-resources uses so the differ can
        // treat both sides uniformly.
        let mut out = Vec::with_capacity(resp.manifests.len());
        for raw in resp.manifests {
            if let Ok(value) = serde_json::from_str::<serde_json::Value>(&raw)
                .or_else(|_| serde_yaml::from_str::<serde_json::Value>(&raw).map_err(|e| e.into()))
            {
                let group = value
                    .get("apiVersion")
                    .and_then(|v| v.as_str())
                    .map(|v| v.split('/').next().unwrap_or("").to_string())
                    .unwrap_or_default();
                let kind = value
                    .get("kind")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let namespace = value
                    .pointer("/metadata/namespace")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                let name = value
                    .pointer("/metadata/name")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                out.push(ManagedResource {
                    group,
                    kind,
                    namespace,
                    name,
                    normalized_live_state: None,
                    target_state: Some(raw),
                });
            }
        }
        Ok(out)
    }

    async fn create_application(&self, app: &Application) -> ArgoResult<()> {
        #[derive(Serialize)]
        struct CreateReq<'a> {
            #[serde(flatten)]
            app: &'a Application,
        }
        let resp = self
            .request(reqwest::Method::POST, "/api/v1/applications")
            .json(&CreateReq { app })
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ArgoError::Api { status, body });
        }
        Ok(())
    }

    async fn delete_application(&self, name: &str) -> ArgoResult<()> {
        let resp = self
            .request(
                reqwest::Method::DELETE,
                &format!("/api/v1/applications/{name}"),
            )
            .send()
            .await?;
        if !resp.status().is_success() && resp.status().as_u16() != 404 {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ArgoError::Api { status, body });
        }
        Ok(())
    }

    async fn set_target_revision(&self, name: &str, revision: &str) -> ArgoResult<()> {
        #[derive(Serialize)]
        struct Patch<'a> {
            spec: PatchSpec<'a>,
        }
        #[derive(Serialize)]
        struct PatchSpec<'a> {
            source: PatchSource<'a>,
        }
        #[derive(Serialize)]
        struct PatchSource<'a> {
            #[serde(rename = "targetRevision")]
            target_revision: &'a str,
        }

        let resp = self
            .request(
                reqwest::Method::PATCH,
                &format!("/api/v1/applications/{name}"),
            )
            .json(&Patch {
                spec: PatchSpec {
                    source: PatchSource {
                        target_revision: revision,
                    },
                },
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ArgoError::Api { status, body });
        }
        Ok(())
    }

    fn instance_url(&self) -> &str {
        &self.base_url
    }
}

/// Minimal percent-encoding for query parameters; avoids pulling in a
/// whole URL crate for the handful of characters ArgoCD selectors need
/// escaped.
fn urlencoding_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
