// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Callable endpoints (`{"data": ...}` in, `{"result": ...}` out).

use crate::error::CheckoutError;
use crate::middleware::CallableContext;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    routing::post,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/checkoutBook", post(checkout_book))
}

#[derive(Deserialize)]
struct CallableRequest {
    #[serde(default)]
    data: serde_json::Value,
}

/// Success envelope; `checkoutBook` returns no payload.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CallableResponse {
    #[cfg_attr(feature = "binding-generation", ts(type = "null"))]
    pub result: serde_json::Value,
}

/// Extract `data` from the request body. Anything unparseable becomes
/// `null`, which the operation rejects once the caller checks have passed.
fn callable_data(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice::<CallableRequest>(body)
        .map(|request| request.data)
        .unwrap_or(serde_json::Value::Null)
}

async fn checkout_book(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<CallableContext>,
    body: Bytes,
) -> Result<Json<CallableResponse>, CheckoutError> {
    let data = callable_data(&body);
    let ids = state.checkout_service.checkout_book(&ctx, &data).await?;

    tracing::debug!(checkouts = ?ids, "checkoutBook succeeded");
    Ok(Json(CallableResponse {
        result: serde_json::Value::Null,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unparseable_bodies_yield_null_data() {
        assert_eq!(callable_data(b""), serde_json::Value::Null);
        assert_eq!(callable_data(b"not json"), serde_json::Value::Null);
        assert_eq!(callable_data(b"{}"), serde_json::Value::Null);
        assert_eq!(
            callable_data(br#"{"data":{"user":"u","books":[]}}"#),
            json!({ "user": "u", "books": [] })
        );
    }
}
