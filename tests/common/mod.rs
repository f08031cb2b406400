// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use library_checkout::config::Config;
use library_checkout::db::{CheckoutStore, FirestoreDb, MemoryDb};
use library_checkout::routes::create_router;
use library_checkout::services::{
    CheckoutService, FirebaseTokenVerifier, StaticDirectory, WizardService,
};
use library_checkout::AppState;
use serde_json::json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

pub const TEST_KID: &str = "test-kid";
pub const STAFF_UID: &str = "staff-1";

const PRIVATE_KEY_PEM: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/test_rsa_private.pem"
));
const PUBLIC_KEY_PEM: &[u8] = include_bytes!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/tests/fixtures/test_rsa_public.pem"
));

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Verifier trusting the fixture key.
#[allow(dead_code)]
pub fn test_verifier(config: &Config) -> FirebaseTokenVerifier {
    let key = DecodingKey::from_rsa_pem(PUBLIC_KEY_PEM).expect("fixture public key");
    FirebaseTokenVerifier::new_with_static_key(config, TEST_KID, key).expect("static verifier")
}

/// Create a test app backed by the in-memory store.
/// `known_uids` are the accounts the identity directory knows about.
#[allow(dead_code)]
pub fn create_test_app(known_uids: &[&str]) -> (axum::Router, Arc<MemoryDb>) {
    let config = Config::test_default();
    let memory = Arc::new(MemoryDb::new());
    let db: Arc<dyn CheckoutStore> = memory.clone();
    let directory = Arc::new(StaticDirectory::new(known_uids.iter().copied()));

    let checkout_service = CheckoutService::new(db.clone(), directory, config.region.clone());
    let wizard_service =
        WizardService::new(db, checkout_service.clone(), config.loan_period_days);

    let state = Arc::new(AppState {
        token_verifier: Arc::new(test_verifier(&config)),
        config,
        checkout_service,
        wizard_service,
    });

    (create_router(state), memory)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

fn sign(claims: &serde_json::Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(TEST_KID.to_string());
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY_PEM).expect("fixture private key");
    encode(&header, claims, &key).expect("sign test token")
}

/// ID token for `uid` with the given custom claims.
#[allow(dead_code)]
pub fn id_token(uid: &str, role: Option<&str>, permissions: serde_json::Value) -> String {
    let config = Config::test_default();
    let now = now_secs();
    let mut claims = json!({
        "iss": format!("https://securetoken.google.com/{}", config.gcp_project_id),
        "aud": config.gcp_project_id,
        "sub": uid,
        "iat": now,
        "exp": now + 3600,
        "permissions": permissions,
    });
    if let Some(role) = role {
        claims["role"] = json!(role);
    }
    sign(&claims)
}

/// ID token of a librarian allowed to check books out.
#[allow(dead_code)]
pub fn staff_id_token() -> String {
    id_token(STAFF_UID, Some("librarian"), json!({ "CHECK_OUT": true }))
}

/// App Check token for the test project.
#[allow(dead_code)]
pub fn app_check_token() -> String {
    let config = Config::test_default();
    let now = now_secs();
    sign(&json!({
        "iss": format!("https://firebaseappcheck.googleapis.com/{}", config.gcp_project_number),
        "aud": [
            format!("projects/{}", config.gcp_project_number),
            format!("projects/{}", config.gcp_project_id),
        ],
        "sub": "1:123456789:web:abcdef",
        "iat": now,
        "exp": now + 3600,
    }))
}

/// Read a JSON response body.
#[allow(dead_code)]
pub async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("JSON body")
}
