// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Three-step checkout wizard: enter patron, scan copies, submit.
//!
//! The session is an explicit value the client sends back on every step.
//! `CheckoutSession` methods are pure transforms; `WizardService` performs
//! the store lookups between them and hands the finished session to the
//! checkout operation.

use crate::db::CheckoutStore;
use crate::error::{AppError, CheckoutError};
use crate::middleware::auth::CallableContext;
use crate::models::{Book, Condition, Copy, CopyMatch, Patron};
use crate::services::checkout::{authorize, CheckoutBookData, CheckoutBookItem, CheckoutService};
use crate::time_utils::due_date;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which wizard step is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    #[default]
    EnterPatron,
    ScanCopies,
    Submit,
}

/// A scanned copy waiting to be checked out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannedCopy {
    pub copy_id: String,
    pub book_id: String,
    pub copy: Copy,
    pub book: Book,
    /// Provisional, for display only
    pub due_date: String,
}

/// One row of the review table shown while scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewRow {
    pub barcode: String,
    pub title: String,
    pub condition: String,
    pub status: String,
    pub notes: String,
}

/// Wizard state carried between steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    #[serde(default)]
    pub step: WizardStep,
    #[serde(default)]
    pub patron_id: Option<String>,
    #[serde(default)]
    pub patron: Option<Patron>,
    #[serde(default)]
    pub items: Vec<ScannedCopy>,
}

/// Operator-facing wizard failures. None of them reach the checkout operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("This User doesn't exist")]
    MissingPatron,
    #[error("This User is disabled")]
    DisabledPatron,
    #[error("You need to enter a barcode")]
    EmptyBarcode,
    #[error("This book has already been scanned.")]
    DuplicateScan,
    #[error("This book doesn't exist")]
    UnknownBarcode,
    #[error("I found more than one book with this barcode.")]
    AmbiguousBarcode,
    #[error("This book is not marked as available.")]
    UnavailableCopy,
    #[error("This copy does not belong to any book (Internal Error)")]
    OrphanCopy,
    #[error("This user does not have a UID")]
    NoPatronUid,
    #[error("Expected step {expected:?}, session is at {actual:?}")]
    WrongStep {
        expected: WizardStep,
        actual: WizardStep,
    },
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingPatron => "MISSING_PATRON",
            Self::DisabledPatron => "DISABLED_PATRON",
            Self::EmptyBarcode => "EMPTY_BARCODE",
            Self::DuplicateScan => "DUPLICATE_SCAN",
            Self::UnknownBarcode => "UNKNOWN_BARCODE",
            Self::AmbiguousBarcode => "AMBIGUOUS_BARCODE",
            Self::UnavailableCopy => "UNAVAILABLE_COPY",
            Self::OrphanCopy => "ORPHAN_COPY",
            Self::NoPatronUid => "NO_PATRON_UID",
            Self::WrongStep { .. } => "WRONG_STEP",
        }
    }
}

impl CheckoutSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn expect_step(&self, expected: WizardStep) -> Result<(), SessionError> {
        if self.step != expected {
            return Err(SessionError::WrongStep {
                expected,
                actual: self.step,
            });
        }
        Ok(())
    }

    /// Accept the looked-up patron and move on to scanning.
    pub fn enter_patron(
        mut self,
        patron_id: &str,
        patron: Option<Patron>,
    ) -> Result<Self, SessionError> {
        self.expect_step(WizardStep::EnterPatron)?;

        let patron = patron.ok_or(SessionError::MissingPatron)?;
        if patron.is_disabled() {
            return Err(SessionError::DisabledPatron);
        }

        self.patron_id = Some(patron_id.to_string());
        self.patron = Some(patron);
        self.step = WizardStep::ScanCopies;
        Ok(self)
    }

    /// Checks that need no lookup; run before querying the store.
    pub fn ensure_not_scanned(&self, barcode: &str) -> Result<(), SessionError> {
        self.expect_step(WizardStep::ScanCopies)?;

        if barcode.trim().is_empty() {
            return Err(SessionError::EmptyBarcode);
        }
        if self.items.iter().any(|item| item.copy.barcode == barcode) {
            return Err(SessionError::DuplicateScan);
        }
        Ok(())
    }

    /// Pick the single lendable copy out of the barcode query results.
    ///
    /// Returns the match together with its owning book id.
    pub fn select_copy(
        &self,
        mut matches: Vec<CopyMatch>,
    ) -> Result<(CopyMatch, String), SessionError> {
        let found = match matches.len() {
            0 => return Err(SessionError::UnknownBarcode),
            1 => matches.remove(0),
            _ => return Err(SessionError::AmbiguousBarcode),
        };

        if self.items.iter().any(|item| item.copy_id == found.copy_id) {
            return Err(SessionError::DuplicateScan);
        }
        if !found.copy.is_available() {
            return Err(SessionError::UnavailableCopy);
        }

        let book_id = found.book_id.clone().ok_or(SessionError::OrphanCopy)?;
        Ok((found, book_id))
    }

    /// Append a selected copy; `book` is the owning book document.
    pub fn add_copy(
        mut self,
        found: CopyMatch,
        book_id: String,
        book: Option<Book>,
        now: DateTime<Utc>,
        loan_period: Duration,
    ) -> Result<Self, SessionError> {
        self.expect_step(WizardStep::ScanCopies)?;
        let book = book.ok_or(SessionError::OrphanCopy)?;

        let mut copy = found.copy;
        copy.condition.get_or_insert(Condition::default());

        self.items.push(ScannedCopy {
            copy_id: found.copy_id,
            book_id,
            copy,
            book,
            due_date: due_date(now, loan_period),
        });
        Ok(self)
    }

    pub fn finish_scanning(mut self) -> Result<Self, SessionError> {
        self.expect_step(WizardStep::ScanCopies)?;
        self.step = WizardStep::Submit;
        Ok(self)
    }

    /// Build the `checkoutBook` request for this session.
    pub fn to_request(&self) -> Result<CheckoutBookData, SessionError> {
        self.expect_step(WizardStep::Submit)?;

        let user = self
            .patron
            .as_ref()
            .and_then(Patron::uid)
            .filter(|uid| !uid.is_empty())
            .ok_or(SessionError::NoPatronUid)?;

        let books = self
            .items
            .iter()
            .map(|item| CheckoutBookItem {
                book: item.book_id.clone(),
                copy: item.copy_id.clone(),
                condition: item.copy.condition.unwrap_or_default(),
            })
            .collect();

        Ok(CheckoutBookData {
            user: user.to_string(),
            books,
        })
    }

    pub fn rows(&self) -> Vec<ReviewRow> {
        self.items
            .iter()
            .map(|item| ReviewRow {
                barcode: item.copy.barcode.clone(),
                title: item.book.display_title(),
                condition: item
                    .copy
                    .condition
                    .map(|c| c.label().to_string())
                    .unwrap_or_default(),
                status: item.copy.status_label().to_string(),
                notes: if item.copy.notes.is_empty() {
                    "None".to_string()
                } else {
                    item.copy.notes.clone()
                },
            })
            .collect()
    }
}

/// Failure of a wizard request.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Store(#[from] AppError),
}

/// Drives a session through the store lookups each step needs.
#[derive(Clone)]
pub struct WizardService {
    store: Arc<dyn CheckoutStore>,
    checkout: CheckoutService,
    loan_period: Duration,
}

impl WizardService {
    pub fn new(store: Arc<dyn CheckoutStore>, checkout: CheckoutService, loan_period_days: i64) -> Self {
        Self {
            store,
            checkout,
            loan_period: Duration::days(loan_period_days),
        }
    }

    pub async fn enter_patron(
        &self,
        ctx: &CallableContext,
        session: CheckoutSession,
        patron_id: &str,
    ) -> Result<CheckoutSession, WizardError> {
        authorize(ctx)?;
        let patron_id = patron_id.trim();
        if patron_id.is_empty() {
            return Err(SessionError::MissingPatron.into());
        }

        let patron = self.store.get_patron(patron_id).await?;
        Ok(session.enter_patron(patron_id, patron)?)
    }

    pub async fn scan(
        &self,
        ctx: &CallableContext,
        session: CheckoutSession,
        barcode: &str,
    ) -> Result<CheckoutSession, WizardError> {
        authorize(ctx)?;
        let barcode = barcode.trim();
        session.ensure_not_scanned(barcode)?;

        let matches = self.store.find_copies_by_barcode(barcode).await?;
        let (found, book_id) = session.select_copy(matches)?;
        let book = self.store.get_book(&book_id).await?;

        tracing::debug!(barcode, copy = %found.copy_id, book = %book_id, "Copy scanned");
        Ok(session.add_copy(found, book_id, book, Utc::now(), self.loan_period)?)
    }

    pub fn finish(
        &self,
        ctx: &CallableContext,
        session: CheckoutSession,
    ) -> Result<CheckoutSession, WizardError> {
        authorize(ctx)?;
        Ok(session.finish_scanning()?)
    }

    /// Invoke the checkout once for the whole session.
    ///
    /// Returns the ids of the created checkout records.
    pub async fn submit(
        &self,
        ctx: &CallableContext,
        session: &CheckoutSession,
    ) -> Result<Vec<String>, WizardError> {
        authorize(ctx)?;
        let request = session.to_request()?;
        Ok(self.checkout.checkout_request(ctx, &request).await?)
    }
}
