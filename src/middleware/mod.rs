// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (caller context, security headers).

pub mod auth;
pub mod security;

pub use auth::{attach_callable_context, CallableContext};
