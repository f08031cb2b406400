// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The `checkoutBook` operation.
//!
//! Preconditions are evaluated in a fixed order, each with its own failure:
//! attested client, authenticated caller, assigned role, `CHECK_OUT`
//! permission, well-formed request, known patron, checkout limit. On success
//! every checkout record and the patron's active-set update land in a single
//! commit.

use crate::db::{new_document_id, CheckoutStore};
use crate::error::CheckoutError;
use crate::middleware::auth::{AuthContext, CallableContext, Permission};
use crate::models::{CheckoutInfo, CheckoutRecord, Condition, NewCheckout};
use crate::services::identity::IdentityDirectory;
use crate::time_utils::format_utc_rfc3339;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Largest batch accepted in one call; keeps the commit under Firestore's
/// write limit with room for the patron update.
pub const MAX_BATCH_SIZE: usize = 400;

/// Request payload of `checkoutBook`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CheckoutBookData {
    /// Patron uid
    pub user: String,
    pub books: Vec<CheckoutBookItem>,
}

/// One copy to lend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CheckoutBookItem {
    pub book: String,
    pub copy: String,
    pub condition: Condition,
}

impl CheckoutBookData {
    /// Parse and validate the untyped callable `data` field.
    pub fn from_value(data: &serde_json::Value) -> Result<Self, CheckoutError> {
        let invalid = |msg: &str| CheckoutError::InvalidArgument(msg.to_string());

        let object = data
            .as_object()
            .ok_or_else(|| invalid("The function must be called with a user and a list of books"))?;

        let user = object
            .get("user")
            .and_then(|v| v.as_str())
            .ok_or_else(|| invalid("'user' must be a string"))?;

        let books = object
            .get("books")
            .and_then(|v| v.as_array())
            .ok_or_else(|| invalid("'books' must be a list"))?;

        let books = books
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                serde_json::from_value::<CheckoutBookItem>(entry.clone()).map_err(|e| {
                    CheckoutError::InvalidArgument(format!("books[{index}] is malformed: {e}"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let request = Self {
            user: user.to_string(),
            books,
        };
        request.validate()?;
        Ok(request)
    }

    /// Checks beyond shape: non-empty ids, batch size, no repeated copy.
    pub fn validate(&self) -> Result<(), CheckoutError> {
        if self.user.trim().is_empty() {
            return Err(CheckoutError::InvalidArgument(
                "'user' must not be empty".to_string(),
            ));
        }

        if self.books.len() > MAX_BATCH_SIZE {
            return Err(CheckoutError::InvalidArgument(format!(
                "At most {MAX_BATCH_SIZE} books can be checked out at once"
            )));
        }

        let mut seen = HashSet::new();
        for item in &self.books {
            if item.book.is_empty() || item.copy.is_empty() {
                return Err(CheckoutError::InvalidArgument(
                    "'book' and 'copy' must not be empty".to_string(),
                ));
            }
            if !seen.insert(item.copy.as_str()) {
                return Err(CheckoutError::InvalidArgument(format!(
                    "Copy {} appears more than once",
                    item.copy
                )));
            }
        }

        Ok(())
    }
}

/// Checks 1-4: attestation, authentication, role, permission.
pub fn authorize(ctx: &CallableContext) -> Result<&AuthContext, CheckoutError> {
    if ctx.app.is_none() {
        return Err(CheckoutError::UnverifiedClient);
    }

    let auth = ctx.auth.as_ref().ok_or(CheckoutError::Unauthenticated)?;

    if auth.role.is_none() {
        return Err(CheckoutError::NoRole);
    }

    if !auth.has_permission(Permission::CheckOut) {
        return Err(CheckoutError::PermissionDenied);
    }

    Ok(auth)
}

/// The whole batch must fit in the patron's remaining slots.
pub fn ensure_within_limit(info: &CheckoutInfo, requested: usize) -> Result<(), CheckoutError> {
    let active = info.active_count();
    if active >= info.max_checkouts as usize || requested > info.remaining_slots() {
        return Err(CheckoutError::TooManyBooks {
            active,
            max: info.max_checkouts,
            requested,
        });
    }
    Ok(())
}

/// Executes `checkoutBook` against a store and an identity directory.
#[derive(Clone)]
pub struct CheckoutService {
    store: Arc<dyn CheckoutStore>,
    directory: Arc<dyn IdentityDirectory>,
    region: String,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn CheckoutStore>,
        directory: Arc<dyn IdentityDirectory>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            store,
            directory,
            region: region.into(),
        }
    }

    /// Run the callable on its raw `data` payload.
    ///
    /// Returns the ids of the created checkout records.
    pub async fn checkout_book(
        &self,
        ctx: &CallableContext,
        data: &serde_json::Value,
    ) -> Result<Vec<String>, CheckoutError> {
        let staff = authorize(ctx)?;
        let request = CheckoutBookData::from_value(data)?;
        self.checkout_authorized(staff, &request).await
    }

    /// Run the callable on an already typed request.
    pub async fn checkout_request(
        &self,
        ctx: &CallableContext,
        request: &CheckoutBookData,
    ) -> Result<Vec<String>, CheckoutError> {
        let staff = authorize(ctx)?;
        request.validate()?;
        self.checkout_authorized(staff, request).await
    }

    async fn checkout_authorized(
        &self,
        staff: &AuthContext,
        request: &CheckoutBookData,
    ) -> Result<Vec<String>, CheckoutError> {
        let patron_uid = request.user.as_str();

        if !self.directory.user_exists(patron_uid).await? {
            tracing::info!(patron = patron_uid, "Checkout for unknown patron");
            return Err(CheckoutError::UnknownUser);
        }

        let patron = self.store.get_patron(patron_uid).await?.unwrap_or_default();
        let info = patron.checkout_info().map_err(|e| {
            tracing::error!(patron = patron_uid, error = %e, "Corrupt patron checkout profile");
            CheckoutError::Internal(e.to_string())
        })?;

        ensure_within_limit(&info, request.books.len())?;

        if request.books.is_empty() {
            tracing::debug!(patron = patron_uid, "Empty checkout batch, nothing to commit");
            return Ok(Vec::new());
        }

        let time_out = format_utc_rfc3339(chrono::Utc::now());
        let checkouts: Vec<NewCheckout> = request
            .books
            .iter()
            .map(|item| NewCheckout {
                id: new_document_id(),
                record: CheckoutRecord {
                    book: item.book.clone(),
                    copy: item.copy.clone(),
                    user: patron_uid.to_string(),
                    checked_out_by: staff.uid.clone(),
                    time_out: time_out.clone(),
                    time_in: None,
                    condition_out: item.condition,
                    condition_in: None,
                },
            })
            .collect();

        self.store.commit_checkouts(patron_uid, &checkouts).await?;

        tracing::info!(
            region = %self.region,
            patron = patron_uid,
            staff = %staff.uid,
            count = checkouts.len(),
            active_before = info.active_count(),
            max_checkouts = info.max_checkouts,
            "Checkout completed"
        );

        Ok(checkouts.into_iter().map(|c| c.id).collect())
    }
}
