// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod checkout;
pub mod copy;
pub mod patron;

pub use checkout::{CheckoutRecord, NewCheckout};
pub use copy::{Book, Condition, Copy, CopyMatch, CopyStatus, VolumeInfo};
pub use patron::{CheckoutInfo, Patron, StoredCheckoutInfo, UserInfo};
