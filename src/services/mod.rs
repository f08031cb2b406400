// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod checkout;
pub mod firebase_tokens;
pub mod identity;
pub mod wizard;

pub use checkout::{CheckoutBookData, CheckoutBookItem, CheckoutService};
pub use firebase_tokens::{FirebaseTokenVerifier, TokenError};
pub use identity::{FirebaseAuthDirectory, IdentityDirectory, StaticDirectory};
pub use wizard::{CheckoutSession, SessionError, WizardError, WizardService};
