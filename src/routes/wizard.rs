// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Checkout wizard API. Each step posts the current session and gets the
//! next one back.

use crate::error::ErrorResponse;
use crate::middleware::CallableContext;
use crate::services::wizard::{CheckoutSession, ReviewRow, SessionError, WizardError};
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/wizard/patron", post(enter_patron))
        .route("/api/wizard/scan", post(scan_copy))
        .route("/api/wizard/finish", post(finish_scanning))
        .route("/api/wizard/submit", post(submit))
}

// ─── Requests / responses ────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatronStepRequest {
    #[serde(default)]
    pub session: CheckoutSession,
    pub patron_id: String,
}

#[derive(Deserialize)]
pub struct ScanStepRequest {
    pub session: CheckoutSession,
    pub barcode: String,
}

#[derive(Deserialize)]
pub struct SessionRequest {
    pub session: CheckoutSession,
}

/// Next session state plus the review table for it.
#[derive(Serialize)]
pub struct SessionResponse {
    pub session: CheckoutSession,
    pub rows: Vec<ReviewRow>,
}

impl From<CheckoutSession> for SessionResponse {
    fn from(session: CheckoutSession) -> Self {
        let rows = session.rows();
        Self { session, rows }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub checkout_ids: Vec<String>,
    /// Fresh session for the next patron
    pub session: CheckoutSession,
}

// ─── Handlers ────────────────────────────────────────────────

async fn enter_patron(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<CallableContext>,
    Json(request): Json<PatronStepRequest>,
) -> Result<Json<SessionResponse>, WizardError> {
    let session = state
        .wizard_service
        .enter_patron(&ctx, request.session, &request.patron_id)
        .await?;
    Ok(Json(session.into()))
}

async fn scan_copy(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<CallableContext>,
    Json(request): Json<ScanStepRequest>,
) -> Result<Json<SessionResponse>, WizardError> {
    let session = state
        .wizard_service
        .scan(&ctx, request.session, &request.barcode)
        .await?;
    Ok(Json(session.into()))
}

async fn finish_scanning(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<CallableContext>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, WizardError> {
    let session = state.wizard_service.finish(&ctx, request.session)?;
    Ok(Json(session.into()))
}

async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<CallableContext>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SubmitResponse>, WizardError> {
    let checkout_ids = state.wizard_service.submit(&ctx, &request.session).await?;
    Ok(Json(SubmitResponse {
        checkout_ids,
        session: CheckoutSession::new(),
    }))
}

// ─── Errors ──────────────────────────────────────────────────

fn session_status(err: &SessionError) -> StatusCode {
    match err {
        SessionError::MissingPatron | SessionError::UnknownBarcode => StatusCode::NOT_FOUND,
        SessionError::DuplicateScan | SessionError::WrongStep { .. } => StatusCode::CONFLICT,
        _ => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for WizardError {
    fn into_response(self) -> Response {
        match self {
            WizardError::Session(err) => {
                tracing::info!(code = err.code(), "Wizard step rejected");
                let body = ErrorResponse {
                    error: err.code().to_string(),
                    details: Some(err.to_string()),
                };
                (session_status(&err), Json(body)).into_response()
            }
            WizardError::Checkout(err) => err.into_response(),
            WizardError::Store(err) => err.into_response(),
        }
    }
}
