// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Callable context middleware.
//!
//! Verifies the App Check token and the ID token when present and records
//! the outcome as a [`CallableContext`]. It never rejects a request: the
//! callable decides, in a fixed order, which missing piece is fatal.

use crate::services::firebase_tokens::TokenError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Header carrying the App Check attestation token.
pub const APP_CHECK_HEADER: &str = "x-firebase-appcheck";

/// Permissions granted through the `permissions` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    CheckOut,
}

impl Permission {
    pub fn claim_name(self) -> &'static str {
        match self {
            Permission::CheckOut => "CHECK_OUT",
        }
    }
}

/// Attested client application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppCheckContext {
    pub app_id: String,
}

/// Authenticated caller extracted from a verified ID token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthContext {
    /// Identity-provider uid (staff member)
    pub uid: String,
    pub role: Option<String>,
    pub permissions: HashMap<String, bool>,
}

impl AuthContext {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions
            .get(permission.claim_name())
            .copied()
            .unwrap_or(false)
    }
}

/// What is known about the caller of a callable.
#[derive(Debug, Clone, Default)]
pub struct CallableContext {
    pub app: Option<AppCheckContext>,
    pub auth: Option<AuthContext>,
}

/// Middleware that attaches a [`CallableContext`] to every request.
pub async fn attach_callable_context(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    // Copy tokens out so no borrow of the request is held across awaits.
    let app_check_token = request
        .headers()
        .get(APP_CHECK_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);
    let id_token = bearer_token(request.headers()).map(str::to_string);

    let app = match app_check_token {
        Some(token) => log_rejection(
            "app_check",
            state.token_verifier.verify_app_check_token(&token).await,
        ),
        None => None,
    };

    let auth = match id_token {
        Some(token) => log_rejection(
            "id_token",
            state.token_verifier.verify_id_token(&token).await,
        ),
        None => None,
    };

    request
        .extensions_mut()
        .insert(CallableContext { app, auth });

    next.run(request).await
}

fn log_rejection<T>(token_kind: &'static str, result: Result<T, TokenError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(TokenError::Invalid(reason)) => {
            tracing::warn!(token_kind, reason = %reason, "Ignoring invalid token");
            None
        }
        Err(TokenError::Transient(reason)) => {
            tracing::error!(token_kind, reason = %reason, "Token verification transient failure");
            None
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn permission_must_be_explicitly_true() {
        let mut auth = AuthContext {
            uid: "staff".to_string(),
            ..Default::default()
        };
        assert!(!auth.has_permission(Permission::CheckOut));

        auth.permissions.insert("CHECK_OUT".to_string(), false);
        assert!(!auth.has_permission(Permission::CheckOut));

        auth.permissions.insert("CHECK_OUT".to_string(), true);
        assert!(auth.has_permission(Permission::CheckOut));
    }
}
