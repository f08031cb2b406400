// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Caller context, health and CORS tests.
//!
//! These tests verify that:
//! 1. ID tokens that fail verification are treated as absent
//! 2. The health route needs no tokens
//! 3. CORS preflight requests allow the App Check header

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::{app_check_token, create_test_app, json_body};

fn callable_request(id_token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/checkoutBook")
        .header("X-Firebase-AppCheck", app_check_token())
        .header(header::AUTHORIZATION, format!("Bearer {id_token}"))
        .body(Body::from(
            json!({ "data": { "user": "patron-1", "books": [] } }).to_string(),
        ))
        .unwrap()
}

async fn error_kind(response: axum::response::Response) -> String {
    json_body(response).await["error"]["kind"]
        .as_str()
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn test_hs256_id_token_is_rejected() {
    let (app, _) = create_test_app(&["patron-1"]);

    let forged = encode(
        &Header::new(Algorithm::HS256),
        &json!({
            "iss": "https://securetoken.google.com/test-project",
            "aud": "test-project",
            "sub": "staff-1",
            "role": "librarian",
            "permissions": { "CHECK_OUT": true },
            "exp": 4102444800u64,
            "iat": 1700000000u64,
        }),
        &EncodingKey::from_secret(b"guessable"),
    )
    .unwrap();

    let response = app.oneshot(callable_request(&forged)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_kind(response).await, "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_id_token_for_other_project_is_rejected() {
    let (app, _) = create_test_app(&["patron-1"]);

    // App Check token reused as an ID token: signed by a trusted key, but
    // with the wrong issuer and audience.
    let response = app
        .oneshot(callable_request(&app_check_token()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_kind(response).await, "UNAUTHENTICATED");
}

#[tokio::test]
async fn test_valid_tokens_reach_the_checkout() {
    let (app, db) = create_test_app(&["patron-1"]);

    let response = app
        .oneshot(callable_request(&common::staff_id_token()))
        .await
        .unwrap();

    // Empty batch: succeeds without touching the store.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(db.commit_attempts(), 0);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _) = create_test_app(&[]);

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/checkoutBook")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(
                    header::ACCESS_CONTROL_REQUEST_HEADERS,
                    "x-firebase-appcheck,authorization",
                )
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let allowed = response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_HEADERS)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    assert!(allowed.contains("x-firebase-appcheck"), "allowed: {allowed}");
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_cors_rejects_unknown_origin() {
    let (app, _) = create_test_app(&[]);

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/checkoutBook")
                .header(header::ORIGIN, "https://evil.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(!response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_health_needs_no_tokens() {
    let (app, _) = create_test_app(&[]);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("Cache-Control").unwrap(), "no-store");

    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
}
