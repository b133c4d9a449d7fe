//! Per-owner GitHub client cache.
//!
//! Keyed by repository owner when the principal is a GitHub App
//! installation (each owner may have a distinct installation id), or by
//! the constant `"global"` when the principal is a single static token.
//! Two independent registries should be constructed by the caller — one
//! for the main identity, one for the optional PR-approver identity — so
//! their cache keys never collide.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::client::{ClientPair, GraphQlClient, RestClient};
use crate::errors::{GhError, GhResult};

const CACHE_CAPACITY: usize = 128;
const GLOBAL_KEY: &str = "global";

/// Names of the three environment variables that configure one identity.
///
/// Passing distinct names lets the same registry machinery back both the
/// main identity (`GITHUB_APP_ID` / ...) and the approver identity
/// (`APPROVER_GITHUB_APP_ID` / ...).
#[derive(Debug, Clone, Copy)]
pub struct EnvNames {
    pub app_id: &'static str,
    pub app_private_key_path: &'static str,
    pub oauth_token: &'static str,
}

pub const MAIN_IDENTITY_ENV: EnvNames = EnvNames {
    app_id: "GITHUB_APP_ID",
    app_private_key_path: "GITHUB_APP_PRIVATE_KEY_PATH",
    oauth_token: "GITHUB_OAUTH_TOKEN",
};

pub const APPROVER_IDENTITY_ENV: EnvNames = EnvNames {
    app_id: "APPROVER_GITHUB_APP_ID",
    app_private_key_path: "APPROVER_GITHUB_APP_PRIVATE_KEY_PATH",
    oauth_token: "APPROVER_GITHUB_OAUTH_TOKEN",
};

pub struct ClientRegistry {
    cache: Mutex<LruCache<String, ClientPair>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                std::num::NonZeroUsize::new(CACHE_CAPACITY).unwrap(),
            )),
        }
    }

    /// Ensures a client pair exists for `owner` under `env`, creating and
    /// caching it on first use.
    pub async fn ensure_and_fetch(&self, owner: &str, env: EnvNames) -> GhResult<ClientPair> {
        let (key, app_id) = resolve_identity_key(owner, env)?;

        if let Some(pair) = self.cache.lock().unwrap().get(&key).cloned() {
            debug!(owner = %key, "client cache hit");
            return Ok(pair);
        }

        let rest_base = rest_base_url();
        let graphql_base = graphql_base_url();

        let pair = match app_id {
            Some(app_id) => {
                build_installation_pair(owner, app_id, env, &rest_base, &graphql_base).await?
            }
            None => build_token_pair(env, &rest_base, &graphql_base)?,
        };

        self.cache.lock().unwrap().put(key, pair.clone());
        Ok(pair)
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_identity_key(owner: &str, env: EnvNames) -> GhResult<(String, Option<i64>)> {
    if let Ok(raw) = std::env::var(env.app_id) {
        let app_id: i64 = raw
            .parse()
            .map_err(|_| GhError::MissingEnv(env.app_id))?;
        // Also require the private key path env var to be set, failing
        // fast at startup rather than on first use.
        if std::env::var(env.app_private_key_path).is_err() {
            return Err(GhError::MissingEnv(env.app_private_key_path));
        }
        Ok((owner.to_string(), Some(app_id)))
    } else if std::env::var(env.oauth_token).is_ok() {
        Ok((GLOBAL_KEY.to_string(), None))
    } else {
        Err(GhError::MissingEnv(env.oauth_token))
    }
}

fn rest_base_url() -> String {
    match std::env::var("GITHUB_HOST") {
        Ok(host) if !host.is_empty() => format!("https://{host}/api/v3"),
        _ => "https://api.github.com".to_string(),
    }
}

fn graphql_base_url() -> String {
    match std::env::var("GITHUB_HOST") {
        Ok(host) if !host.is_empty() => format!("https://{host}/api/graphql"),
        _ => "https://api.github.com/graphql".to_string(),
    }
}

/// The web (non-API) base URL, e.g. for blame links and repo URLs:
/// `https://github.com` normally, or `https://<GITHUB_HOST>` on
/// Enterprise — distinct from [`rest_base_url`], which adds `/api/v3`.
pub fn github_web_base_url() -> String {
    match std::env::var("GITHUB_HOST") {
        Ok(host) if !host.is_empty() => format!("https://{host}"),
        _ => "https://github.com".to_string(),
    }
}

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("telefonistka-controller")
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("failed to build reqwest client")
}

#[derive(Serialize)]
struct AppJwtClaims {
    iat: u64,
    exp: u64,
    iss: i64,
}

fn mint_app_jwt(app_id: i64, private_key_path: &str) -> GhResult<String> {
    let pem = std::fs::read(private_key_path).map_err(|source| GhError::PrivateKey {
        path: private_key_path.to_string(),
        source,
    })?;
    let key = EncodingKey::from_rsa_pem(&pem)?;
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_secs();
    let claims = AppJwtClaims {
        iat: now.saturating_sub(60),
        exp: now + 9 * 60,
        iss: app_id,
    };
    let token = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)?;
    Ok(token)
}

#[derive(Deserialize)]
struct Installation {
    id: i64,
    account: InstallationAccount,
}

#[derive(Deserialize)]
struct InstallationAccount {
    login: String,
}

#[derive(Deserialize)]
struct InstallationTokenResponse {
    token: String,
}

async fn find_installation_id(
    http: &reqwest::Client,
    rest_base: &str,
    jwt: &str,
    owner: &str,
) -> GhResult<i64> {
    let resp = http
        .get(format!("{rest_base}/app/installations"))
        .bearer_auth(jwt)
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", "telefonistka-controller")
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(GhError::Api { status, body });
    }

    let installations: Vec<Installation> = resp.json().await?;
    for install in &installations {
        if install.account.login.eq_ignore_ascii_case(owner) {
            return Ok(install.id);
        }
    }

    error!(%owner, "no installation matches this owner");
    Ok(0)
}

async fn mint_installation_token(
    http: &reqwest::Client,
    rest_base: &str,
    jwt: &str,
    installation_id: i64,
) -> GhResult<String> {
    let resp = http
        .post(format!(
            "{rest_base}/app/installations/{installation_id}/access_tokens"
        ))
        .bearer_auth(jwt)
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", "telefonistka-controller")
        .send()
        .await?;

    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(GhError::Api { status, body });
    }

    let token: InstallationTokenResponse = resp.json().await?;
    Ok(token.token)
}

async fn build_installation_pair(
    owner: &str,
    app_id: i64,
    env: EnvNames,
    rest_base: &str,
    graphql_base: &str,
) -> GhResult<ClientPair> {
    // Private key path validated present in `resolve_identity_key`; the
    // actual env lookup happens again here to keep this function
    // self-contained and testable in isolation.
    let key_path = std::env::var(env.app_private_key_path)
        .map_err(|_| GhError::MissingEnv(env.app_private_key_path))?;

    let jwt = mint_app_jwt(app_id, &key_path)?;
    let http = http_client();
    let installation_id = find_installation_id(&http, rest_base, &jwt, owner).await?;
    info!(%owner, installation_id, "resolved github app installation");
    let token = mint_installation_token(&http, rest_base, &jwt, installation_id).await?;

    let auth_header = format!("token {token}");
    Ok(ClientPair {
        rest: RestClient::new(http.clone(), rest_base.to_string(), auth_header.clone())
            .with_owner(owner),
        graphql: GraphQlClient::new(http, graphql_base.to_string(), auth_header),
    })
}

fn build_token_pair(env: EnvNames, rest_base: &str, graphql_base: &str) -> GhResult<ClientPair> {
    let token = std::env::var(env.oauth_token).map_err(|_| GhError::MissingEnv(env.oauth_token))?;
    let http = http_client();
    let auth_header = format!("Bearer {token}");
    Ok(ClientPair {
        rest: RestClient::new(http.clone(), rest_base.to_string(), auth_header.clone())
            .with_owner(GLOBAL_KEY),
        graphql: GraphQlClient::new(http, graphql_base.to_string(), auth_header),
    })
}
