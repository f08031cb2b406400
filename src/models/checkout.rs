// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Checkout record model for storage.

use crate::models::Condition;
use serde::{Deserialize, Serialize};

/// One copy lent to one patron, stored in `checkouts`.
///
/// Created once at checkout; a later return fills `time_in` and
/// `condition_in`. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRecord {
    /// Book document id
    pub book: String,
    /// Copy document id (nested under the book)
    pub copy: String,
    /// Patron uid
    pub user: String,
    /// Staff uid that performed the checkout
    pub checked_out_by: String,
    /// When the copy left the library (RFC3339, UTC)
    pub time_out: String,
    /// When the copy came back; `None` while outstanding
    pub time_in: Option<String>,
    pub condition_out: Condition,
    pub condition_in: Option<Condition>,
}

impl CheckoutRecord {
    pub fn is_outstanding(&self) -> bool {
        self.time_in.is_none()
    }
}

/// A checkout record paired with its freshly generated document id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckout {
    pub id: String,
    pub record: CheckoutRecord,
}
