// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Verification of Firebase ID tokens and App Check tokens.
//!
//! Both are RS256 JWTs signed by keys published as JWKS. Keys are cached
//! using the `Cache-Control: max-age` of the JWKS response and refreshed once
//! when an unknown `kid` shows up.

use crate::config::Config;
use crate::middleware::auth::{AppCheckContext, AuthContext};
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{Mutex, RwLock};

const ID_TOKEN_JWKS_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";
const APP_CHECK_JWKS_URL: &str = "https://firebaseappcheck.googleapis.com/v1/jwks";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

/// Token verification error categories.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The token is malformed, expired, or its claims do not match.
    #[error("invalid token: {0}")]
    Invalid(String),
    /// Keys could not be fetched; the token was not judged.
    #[error("transient failure: {0}")]
    Transient(String),
}

#[derive(Clone)]
enum KeySource {
    Jwks { url: &'static str },
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// One JWKS-backed key set with its own cache.
struct KeySet {
    http_client: reqwest::Client,
    source: KeySource,
    cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl KeySet {
    fn new(http_client: reqwest::Client, source: KeySource) -> Self {
        Self {
            http_client,
            source,
            cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Decode and validate `token`, returning its claims.
    async fn verify<C: DeserializeOwned>(
        &self,
        token: &str,
        validation: &Validation,
    ) -> Result<C, TokenError> {
        let header = decode_header(token)
            .map_err(|e| TokenError::Invalid(format!("invalid JWT header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(TokenError::Invalid(format!(
                "unexpected JWT alg: {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| TokenError::Invalid("missing JWT kid".to_string()))?;

        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        decode::<C>(token, decoding_key.as_ref(), validation)
            .map(|data| data.claims)
            .map_err(|e| TokenError::Invalid(format!("JWT validation failed: {e}")))
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, TokenError> {
        let url = match &self.source {
            KeySource::StaticKey {
                kid: static_kid,
                decoding_key,
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }

                return Err(TokenError::Invalid(format!(
                    "unknown JWT kid for static verifier: {kid}"
                )));
            }
            KeySource::Jwks { url } => *url,
        };

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(url, force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        Err(TokenError::Invalid(format!(
            "JWT kid not found in JWKS after refresh: {kid}"
        )))
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, url: &str, force_refresh: bool) -> Result<(), TokenError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        tracing::debug!(jwks_uri = %url, "Refreshing JWKS cache");

        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| TokenError::Transient(format!("JWKS request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(TokenError::Transient(format!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| TokenError::Transient(format!("invalid JWKS JSON: {e}")))?;

        let keys_by_kid = usable_keys(jwks);

        if keys_by_kid.is_empty() {
            return Err(TokenError::Transient(
                "JWKS response did not include any usable RSA keys".to_string(),
            ));
        }

        *self.cache.write().await = Some(JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        });

        tracing::debug!(ttl_secs = ttl.as_secs(), "JWKS cache refreshed");
        Ok(())
    }
}

/// Keep only RSA signing keys usable with RS256.
fn usable_keys(jwks: Jwks) -> HashMap<String, Arc<DecodingKey>> {
    let mut keys_by_kid = HashMap::new();

    for jwk in jwks.keys {
        if jwk.kty != "RSA" || jwk.kid.trim().is_empty() {
            continue;
        }
        if jwk.alg.as_deref().is_some_and(|alg| alg != "RS256") {
            continue;
        }
        if jwk.use_.as_deref().is_some_and(|use_| use_ != "sig") {
            continue;
        }

        match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
            Ok(key) => {
                keys_by_kid.insert(jwk.kid, Arc::new(key));
            }
            Err(e) => {
                tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
            }
        }
    }

    keys_by_kid
}

/// Verifier for the two tokens a callable request carries.
pub struct FirebaseTokenVerifier {
    project_id: String,
    project_number: String,
    id_keys: KeySet,
    app_check_keys: KeySet,
}

impl FirebaseTokenVerifier {
    /// Production verifier that fetches and caches Google-published keys.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = build_http_client()?;

        tracing::info!(
            project_id = %config.gcp_project_id,
            project_number = %config.gcp_project_number,
            "Initialized Firebase token verifier"
        );

        Ok(Self {
            project_id: config.gcp_project_id.clone(),
            project_number: config.gcp_project_number.clone(),
            id_keys: KeySet::new(
                http_client.clone(),
                KeySource::Jwks {
                    url: ID_TOKEN_JWKS_URL,
                },
            ),
            app_check_keys: KeySet::new(
                http_client,
                KeySource::Jwks {
                    url: APP_CHECK_JWKS_URL,
                },
            ),
        })
    }

    /// Verifier that trusts a single static RSA public key for both token kinds.
    ///
    /// This is intended for deterministic local/integration tests.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static key kid must not be empty");
        }

        let http_client = build_http_client()?;
        let source = KeySource::StaticKey {
            kid,
            decoding_key: Arc::new(decoding_key),
        };

        Ok(Self {
            project_id: config.gcp_project_id.clone(),
            project_number: config.gcp_project_number.clone(),
            id_keys: KeySet::new(http_client.clone(), source.clone()),
            app_check_keys: KeySet::new(http_client, source),
        })
    }

    /// Expected `iss` of ID tokens for this project.
    pub fn id_token_issuer(&self) -> String {
        format!("https://securetoken.google.com/{}", self.project_id)
    }

    /// Expected `iss` of App Check tokens for this project.
    pub fn app_check_issuer(&self) -> String {
        format!("https://firebaseappcheck.googleapis.com/{}", self.project_number)
    }

    /// Expected `aud` entry of App Check tokens for this project.
    pub fn app_check_audience(&self) -> String {
        format!("projects/{}", self.project_number)
    }

    /// Verify a Firebase Auth ID token and extract the caller's claims.
    pub async fn verify_id_token(&self, token: &str) -> Result<AuthContext, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.id_token_issuer()]);
        validation.set_audience(&[self.project_id.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims: IdTokenClaims = self.id_keys.verify(token, &validation).await?;
        validate_iat(claims.iat)?;

        if claims.sub.is_empty() {
            return Err(TokenError::Invalid("empty sub claim".to_string()));
        }

        Ok(AuthContext {
            uid: claims.sub,
            role: claims.role.and_then(role_name),
            permissions: granted_permissions(claims.permissions),
        })
    }

    /// Verify an App Check token and extract the attested app id.
    pub async fn verify_app_check_token(&self, token: &str) -> Result<AppCheckContext, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.app_check_issuer()]);
        validation.set_audience(&[self.app_check_audience()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let claims: AppCheckClaims = self.app_check_keys.verify(token, &validation).await?;

        if claims.sub.is_empty() {
            return Err(TokenError::Invalid("empty app id".to_string()));
        }

        Ok(AppCheckContext { app_id: claims.sub })
    }
}

fn build_http_client() -> anyhow::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(DEFAULT_HTTP_TIMEOUT)
        .build()
        .context("failed building JWKS HTTP client")
}

/// Any non-null `role` claim counts as an assigned role.
fn role_name(role: serde_json::Value) -> Option<String> {
    match role {
        serde_json::Value::Null => None,
        serde_json::Value::String(name) => Some(name),
        other => Some(other.to_string()),
    }
}

/// Permissions set to `true` in the `permissions` claim. Entries of any
/// other type grant nothing.
fn granted_permissions(claim: Option<serde_json::Value>) -> HashMap<String, bool> {
    let Some(serde_json::Value::Object(entries)) = claim else {
        return HashMap::new();
    };

    entries
        .into_iter()
        .filter_map(|(name, value)| value.as_bool().map(|granted| (name, granted)))
        .collect()
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    iat: Option<usize>,
    #[serde(default)]
    role: Option<serde_json::Value>,
    #[serde(default)]
    permissions: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct AppCheckClaims {
    sub: String,
}

fn validate_iat(iat: Option<usize>) -> Result<(), TokenError> {
    let now = now_unix_secs();

    let Some(iat) = iat else {
        return Err(TokenError::Invalid("missing iat claim".to_string()));
    };

    if iat as u64 > now + CLOCK_SKEW_SECS {
        return Err(TokenError::Invalid("iat claim is in the future".to_string()));
    }

    Ok(())
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
        .map_or(fallback, Duration::from_secs)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        directive
            .trim()
            .strip_prefix("max-age=")
            .and_then(|raw| raw.trim_matches('"').parse::<u64>().ok())
    })
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
