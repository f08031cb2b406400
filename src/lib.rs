// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Library checkout service
//!
//! Backend for lending physical library copies to patrons: the
//! `checkoutBook` callable and the staff checkout wizard built on top of it.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{CheckoutService, FirebaseTokenVerifier, WizardService};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub token_verifier: Arc<FirebaseTokenVerifier>,
    pub checkout_service: CheckoutService,
    pub wizard_service: WizardService,
}
