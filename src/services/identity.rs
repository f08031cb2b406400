// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity provider account lookups.
//!
//! Patron ids are identity-provider uids; a checkout may only target a uid
//! that resolves to an existing account.

use crate::error::AppError;
use anyhow::Context;
use async_trait::async_trait;
use gcloud_sdk::{GoogleAuthTokenGenerator, TokenSourceType};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

const IDENTITY_TOOLKIT_URL: &str = "https://identitytoolkit.googleapis.com";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Account directory of the identity provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Whether `uid` belongs to an existing account.
    async fn user_exists(&self, uid: &str) -> Result<bool, AppError>;
}

enum Credentials {
    /// Auth emulator accepts the fixed admin token `owner`.
    Emulator,
    /// Application default credentials.
    Google(GoogleAuthTokenGenerator),
}

/// Directory backed by the Firebase Auth account lookup endpoint.
pub struct FirebaseAuthDirectory {
    http_client: reqwest::Client,
    lookup_url: String,
    credentials: Credentials,
}

impl FirebaseAuthDirectory {
    /// Create a directory client.
    ///
    /// For local development with emulator, set FIREBASE_AUTH_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()?;

        let (base_url, credentials) = match std::env::var("FIREBASE_AUTH_EMULATOR_HOST") {
            Ok(host) => {
                tracing::info!(host = %host, "Using Firebase Auth emulator");
                (
                    format!("http://{host}/identitytoolkit.googleapis.com"),
                    Credentials::Emulator,
                )
            }
            Err(_) => {
                let generator = GoogleAuthTokenGenerator::new(
                    TokenSourceType::Default,
                    gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
                )
                .await
                .context("failed to initialize Google credentials")?;
                (IDENTITY_TOOLKIT_URL.to_string(), Credentials::Google(generator))
            }
        };

        Ok(Self {
            http_client,
            lookup_url: lookup_url(&base_url, project_id),
            credentials,
        })
    }

    /// `Authorization` header value for the lookup call.
    async fn authorization(&self) -> Result<String, AppError> {
        match &self.credentials {
            Credentials::Emulator => Ok("Bearer owner".to_string()),
            Credentials::Google(generator) => generator
                .create_token()
                .await
                .map(|token| token.header_value())
                .map_err(|e| AppError::IdentityProvider(format!("access token unavailable: {e}"))),
        }
    }
}

#[async_trait]
impl IdentityDirectory for FirebaseAuthDirectory {
    async fn user_exists(&self, uid: &str) -> Result<bool, AppError> {
        let authorization = self.authorization().await?;

        let response = self
            .http_client
            .post(&self.lookup_url)
            .header(reqwest::header::AUTHORIZATION, authorization)
            .json(&serde_json::json!({ "localId": [uid] }))
            .send()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("account lookup failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // The API answers USER_NOT_FOUND for some malformed uids.
            if status == reqwest::StatusCode::BAD_REQUEST && body.contains("USER_NOT_FOUND") {
                return Ok(false);
            }
            return Err(AppError::IdentityProvider(format!(
                "account lookup returned status {status}: {body}"
            )));
        }

        let lookup: LookupResponse = response
            .json()
            .await
            .map_err(|e| AppError::IdentityProvider(format!("invalid lookup response: {e}")))?;

        Ok(lookup.contains(uid))
    }
}

fn lookup_url(base_url: &str, project_id: &str) -> String {
    format!(
        "{}/v1/projects/{}/accounts:lookup",
        base_url.trim_end_matches('/'),
        project_id
    )
}

#[derive(Debug, Default, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
}

impl LookupResponse {
    fn contains(&self, uid: &str) -> bool {
        self.users.iter().any(|user| user.local_id == uid)
    }
}

/// Fixed set of known uids, for tests and offline runs.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    uids: HashSet<String>,
}

impl StaticDirectory {
    pub fn new<I, S>(uids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uids: uids.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl IdentityDirectory for StaticDirectory {
    async fn user_exists(&self, uid: &str) -> Result<bool, AppError> {
        Ok(self.uids.contains(uid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_url_for_production_and_emulator() {
        assert_eq!(
            lookup_url(IDENTITY_TOOLKIT_URL, "library"),
            "https://identitytoolkit.googleapis.com/v1/projects/library/accounts:lookup"
        );
        assert_eq!(
            lookup_url("http://localhost:9099/identitytoolkit.googleapis.com/", "demo"),
            "http://localhost:9099/identitytoolkit.googleapis.com/v1/projects/demo/accounts:lookup"
        );
    }

    #[test]
    fn empty_lookup_response_means_unknown() {
        let empty: LookupResponse =
            serde_json::from_value(json!({ "kind": "identitytoolkit#GetAccountInfoResponse" }))
                .unwrap();
        assert!(!empty.contains("abc"));

        let found: LookupResponse =
            serde_json::from_value(json!({ "users": [{ "localId": "abc", "email": "a@b.c" }] }))
                .unwrap();
        assert!(found.contains("abc"));
        assert!(!found.contains("xyz"));
    }

    #[tokio::test]
    async fn emulator_uses_owner_token_without_google_credentials() {
        std::env::set_var("FIREBASE_AUTH_EMULATOR_HOST", "localhost:9099");
        let directory = FirebaseAuthDirectory::new("demo").await.unwrap();
        std::env::remove_var("FIREBASE_AUTH_EMULATOR_HOST");

        assert!(matches!(directory.credentials, Credentials::Emulator));
        assert_eq!(directory.authorization().await.unwrap(), "Bearer owner");
        assert_eq!(
            directory.lookup_url,
            "http://localhost:9099/identitytoolkit.googleapis.com/v1/projects/demo/accounts:lookup"
        );
    }

    #[tokio::test]
    async fn static_directory_knows_only_its_uids() {
        let directory = StaticDirectory::new(["patron-1"]);
        assert!(directory.user_exists("patron-1").await.unwrap());
        assert!(!directory.user_exists("patron-2").await.unwrap());
    }
}
