// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Patrons (`users`, keyed by identity-provider uid)
//! - Checkout records (`checkouts`, auto ids)
//! - Books and their nested `copies`

use crate::db::{collections, CheckoutStore, ACTIVE_CHECKOUTS_PATH};
use crate::error::AppError;
use crate::models::{Book, CheckoutRecord, Copy, CopyMatch, NewCheckout, Patron};
use async_trait::async_trait;
use firestore::FirestoreWritePrecondition;

// Firestore limits a commit to 500 writes.
// Each checkout is one write, plus one transform on the patron.
pub const MAX_WRITES_PER_COMMIT: usize = 500;

/// Barcode queries fetch at most this many matches; two is enough to
/// detect an ambiguous barcode.
const BARCODE_MATCH_LIMIT: u32 = 2;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Catalog Maintenance ─────────────────────────────────────

    /// Create or replace a patron document.
    pub async fn upsert_patron(&self, uid: &str, patron: &Patron) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(uid)
            .object(patron)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Create or replace a book document.
    pub async fn set_book(&self, book_id: &str, book: &Book) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::BOOKS)
            .document_id(book_id)
            .object(book)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Create or replace a copy nested under its book.
    pub async fn set_copy(&self, book_id: &str, copy_id: &str, copy: &Copy) -> Result<(), AppError> {
        let client = self.get_client()?;
        let parent_path = client
            .parent_path(collections::BOOKS, book_id)
            .map_err(|e| AppError::Database(e.to_string()))?;

        let _: () = client
            .fluent()
            .update()
            .in_col(collections::COPIES)
            .document_id(copy_id)
            .parent(&parent_path)
            .object(copy)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl CheckoutStore for FirestoreDb {
    // ─── Patron Operations ───────────────────────────────────────

    async fn get_patron(&self, uid: &str) -> Result<Option<Patron>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(uid)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Atomic Checkout Commit ──────────────────────────────────

    /// Stage every checkout create plus one array-union on the patron in a
    /// single transaction, then commit once.
    ///
    /// Checkout documents are written with an `exists: false` precondition so
    /// an id collision aborts the whole commit instead of overwriting.
    async fn commit_checkouts(
        &self,
        patron_uid: &str,
        checkouts: &[NewCheckout],
    ) -> Result<(), AppError> {
        if checkouts.len() + 1 > MAX_WRITES_PER_COMMIT {
            return Err(AppError::BadRequest(format!(
                "Too many checkouts for a single commit: {}",
                checkouts.len()
            )));
        }

        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        for checkout in checkouts {
            client
                .fluent()
                .update()
                .in_col(collections::CHECKOUTS)
                .precondition(FirestoreWritePrecondition::Exists(false))
                .document_id(&checkout.id)
                .object(&checkout.record)
                .add_to_transaction(&mut transaction)
                .map_err(|e| {
                    AppError::Database(format!("Failed to add checkout to transaction: {}", e))
                })?;
        }

        let new_ids: Vec<String> = checkouts.iter().map(|c| c.id.clone()).collect();

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(patron_uid)
            .transforms(|t| {
                t.fields([t
                    .field(ACTIVE_CHECKOUTS_PATH)
                    .append_missing_elements(new_ids.clone())])
            })
            .only_transform()
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add patron update to transaction: {}", e))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            patron = patron_uid,
            count = checkouts.len(),
            "Checkouts committed atomically"
        );

        Ok(())
    }

    // ─── Checkout Operations ─────────────────────────────────────

    async fn get_checkout(&self, checkout_id: &str) -> Result<Option<CheckoutRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CHECKOUTS)
            .obj()
            .one(checkout_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Catalog Operations ──────────────────────────────────────

    async fn find_copies_by_barcode(&self, barcode: &str) -> Result<Vec<CopyMatch>, AppError> {
        let docs = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::COPIES)
            .all_descendants()
            .filter(|q| q.for_all([q.field("barcode").eq(barcode)]))
            .limit(BARCODE_MATCH_LIMIT)
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        docs.iter()
            .map(|doc| {
                let copy: Copy = firestore::FirestoreDb::deserialize_doc_to(doc)
                    .map_err(|e| AppError::Database(format!("Malformed copy {}: {}", doc.name, e)))?;
                let (book_id, copy_id) = split_copy_path(&doc.name);
                Ok(CopyMatch {
                    copy_id,
                    book_id,
                    copy,
                })
            })
            .collect()
    }

    async fn get_book(&self, book_id: &str) -> Result<Option<Book>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::BOOKS)
            .obj()
            .one(book_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Split a copy's full document name into (owning book id, copy id).
///
/// Names look like `projects/p/databases/(default)/documents/books/{book}/copies/{copy}`.
fn split_copy_path(name: &str) -> (Option<String>, String) {
    let segments: Vec<&str> = name.rsplit('/').take(4).collect();
    let copy_id = segments.first().copied().unwrap_or_default().to_string();

    let book_id = match segments.as_slice() {
        [_, copies, book, books] if *copies == collections::COPIES && *books == collections::BOOKS => {
            Some(book.to_string())
        }
        _ => None,
    };

    (book_id, copy_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_copy_path_nested_under_book() {
        let name = "projects/p/databases/(default)/documents/books/b42/copies/c7";
        assert_eq!(split_copy_path(name), (Some("b42".to_string()), "c7".to_string()));
    }

    #[test]
    fn split_copy_path_without_book_parent() {
        let name = "projects/p/databases/(default)/documents/copies/c7";
        assert_eq!(split_copy_path(name), (None, "c7".to_string()));

        let name = "projects/p/databases/(default)/documents/shelves/s1/copies/c7";
        assert_eq!(split_copy_path(name), (None, "c7".to_string()));
    }

    #[tokio::test]
    async fn offline_store_reports_database_error() {
        let db = FirestoreDb::new_mock();
        let err = db.get_patron("someone").await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
    }
}
