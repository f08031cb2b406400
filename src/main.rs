// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Library checkout API server
//!
//! Serves the `checkoutBook` callable and the staff checkout wizard.

use library_checkout::{
    config::Config,
    db::{CheckoutStore, FirestoreDb},
    services::{
        CheckoutService, FirebaseAuthDirectory, FirebaseTokenVerifier, IdentityDirectory,
        WizardService,
    },
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        region = %config.region,
        "Starting library checkout API"
    );

    // Initialize Firestore database
    let db: Arc<dyn CheckoutStore> = Arc::new(FirestoreDb::new(&config.gcp_project_id).await?);

    let directory: Arc<dyn IdentityDirectory> =
        Arc::new(FirebaseAuthDirectory::new(&config.gcp_project_id).await?);

    let token_verifier = Arc::new(FirebaseTokenVerifier::new(&config)?);
    tracing::info!(
        id_token_issuer = %token_verifier.id_token_issuer(),
        app_check_issuer = %token_verifier.app_check_issuer(),
        "Token verifier initialized"
    );

    let checkout_service = CheckoutService::new(db.clone(), directory, config.region.clone());
    let wizard_service =
        WizardService::new(db, checkout_service.clone(), config.loan_period_days);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        token_verifier,
        checkout_service,
        wizard_service,
    });

    // Build router
    let app = library_checkout::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("library_checkout=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
