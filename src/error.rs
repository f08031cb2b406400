// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! `AppError` covers infrastructure failures (store, identity provider).
//! `CheckoutError` is the typed failure of the `checkoutBook` callable and is
//! rendered in the callable error envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Infrastructure error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Identity provider error: {0}")]
    IdentityProvider(String),
}

/// JSON error response body
#[derive(Serialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::IdentityProvider(msg) => {
                tracing::error!(error = %msg, "Identity provider error");
                (StatusCode::BAD_GATEWAY, "identity_provider_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Failure of the `checkoutBook` callable.
///
/// Variants are listed in the order the preconditions are evaluated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckoutError {
    #[error("The function must be called from an App Check verified app.")]
    UnverifiedClient,

    #[error("The function must be called while authenticated.")]
    Unauthenticated,

    #[error("The caller must already have a set role.")]
    NoRole,

    #[error("The user calling the function must have the 'CHECK_OUT' permission.")]
    PermissionDenied,

    #[error("{0}")]
    InvalidArgument(String),

    #[error("Unknown User")]
    UnknownUser,

    #[error("Too many books: {active} of {max} checkouts in use, {requested} requested")]
    TooManyBooks {
        active: usize,
        max: u32,
        requested: usize,
    },

    #[error("{0}")]
    Internal(String),
}

impl CheckoutError {
    /// Stable failure kind reported to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnverifiedClient => "UNVERIFIED_CLIENT",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::NoRole => "NO_ROLE",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::UnknownUser => "UNKNOWN_USER",
            Self::TooManyBooks { .. } => "TOO_MANY_BOOKS",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Callable protocol status code.
    pub fn callable_status(&self) -> &'static str {
        match self {
            Self::UnverifiedClient => "FAILED_PRECONDITION",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::NoRole | Self::PermissionDenied => "PERMISSION_DENIED",
            Self::InvalidArgument(_) | Self::UnknownUser | Self::TooManyBooks { .. } => {
                "INVALID_ARGUMENT"
            }
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnverifiedClient => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::NoRole | Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::InvalidArgument(_) | Self::UnknownUser | Self::TooManyBooks { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Envelope body for this failure.
    pub fn body(&self) -> CallableErrorBody {
        CallableErrorBody {
            error: CallableError {
                kind: self.kind().to_string(),
                status: self.callable_status().to_string(),
                message: self.to_string(),
            },
        }
    }
}

impl From<AppError> for CheckoutError {
    fn from(err: AppError) -> Self {
        tracing::error!(error = %err, "Checkout failed on infrastructure error");
        Self::Internal("Checkout could not be completed".to_string())
    }
}

/// Callable error envelope: `{"error": {...}}`.
#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CallableErrorBody {
    pub error: CallableError,
}

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CallableError {
    pub kind: String,
    pub status: String,
    pub message: String,
}

impl IntoResponse for CheckoutError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(msg) => tracing::error!(error = %msg, "checkoutBook internal failure"),
            other => tracing::info!(kind = other.kind(), message = %other, "checkoutBook rejected"),
        }
        (self.status_code(), Json(self.body())).into_response()
    }
}
