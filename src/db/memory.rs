// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store with Firestore commit semantics.
//!
//! All collections live behind one lock, so a commit is applied entirely or
//! not at all. Commits can be made to fail on demand to exercise rollback.

use crate::db::CheckoutStore;
use crate::error::AppError;
use crate::models::{Book, CheckoutRecord, Copy, CopyMatch, NewCheckout, Patron, StoredCheckoutInfo};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Collections {
    patrons: HashMap<String, Patron>,
    checkouts: HashMap<String, CheckoutRecord>,
    books: HashMap<String, Book>,
    copies: Vec<CopyMatch>,
}

/// In-memory `CheckoutStore`.
#[derive(Default)]
pub struct MemoryDb {
    data: RwLock<Collections>,
    fail_next_commit: AtomicBool,
    commits: AtomicUsize,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_patron(&self, uid: &str, patron: Patron) {
        self.data.write().await.patrons.insert(uid.to_string(), patron);
    }

    pub async fn insert_book(&self, book_id: &str, book: Book) {
        self.data.write().await.books.insert(book_id.to_string(), book);
    }

    /// Add a copy; `book_id = None` models a copy orphaned from its book.
    pub async fn insert_copy(&self, book_id: Option<&str>, copy_id: &str, copy: Copy) {
        self.data.write().await.copies.push(CopyMatch {
            copy_id: copy_id.to_string(),
            book_id: book_id.map(str::to_string),
            copy,
        });
    }

    /// Make the next commit fail as if Firestore aborted the transaction.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of commits that reached the store (successful or not).
    pub fn commit_attempts(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub async fn checkout_count(&self) -> usize {
        self.data.read().await.checkouts.len()
    }

    pub async fn checkouts_for_copy(&self, copy_id: &str) -> Vec<CheckoutRecord> {
        self.data
            .read()
            .await
            .checkouts
            .values()
            .filter(|record| record.copy == copy_id)
            .cloned()
            .collect()
    }
}

/// Array-union `ids` into the stored active set. A non-array value is
/// replaced, matching Firestore's transform behaviour.
fn union_active_checkouts(patron: &mut Patron, ids: &[String]) {
    let info = patron
        .checkout_info
        .get_or_insert_with(StoredCheckoutInfo::default);

    let mut items = match info.active_checkouts.take() {
        Some(serde_json::Value::Array(items)) => items,
        _ => Vec::new(),
    };

    for id in ids {
        let value = serde_json::Value::String(id.clone());
        if !items.contains(&value) {
            items.push(value);
        }
    }

    info.active_checkouts = Some(serde_json::Value::Array(items));
}

#[async_trait]
impl CheckoutStore for MemoryDb {
    async fn get_patron(&self, uid: &str) -> Result<Option<Patron>, AppError> {
        Ok(self.data.read().await.patrons.get(uid).cloned())
    }

    async fn commit_checkouts(
        &self,
        patron_uid: &str,
        checkouts: &[NewCheckout],
    ) -> Result<(), AppError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        let mut data = self.data.write().await;

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(AppError::Database(
                "Transaction commit failed: aborted due to conflict".to_string(),
            ));
        }

        // Validate every staged write before applying any of them.
        if let Some(existing) = checkouts
            .iter()
            .find(|c| data.checkouts.contains_key(&c.id))
        {
            return Err(AppError::Database(format!(
                "Transaction commit failed: checkouts/{} already exists",
                existing.id
            )));
        }

        for checkout in checkouts {
            data.checkouts
                .insert(checkout.id.clone(), checkout.record.clone());
        }

        let ids: Vec<String> = checkouts.iter().map(|c| c.id.clone()).collect();
        let patron = data.patrons.entry(patron_uid.to_string()).or_default();
        union_active_checkouts(patron, &ids);

        Ok(())
    }

    async fn get_checkout(&self, checkout_id: &str) -> Result<Option<CheckoutRecord>, AppError> {
        Ok(self.data.read().await.checkouts.get(checkout_id).cloned())
    }

    async fn find_copies_by_barcode(&self, barcode: &str) -> Result<Vec<CopyMatch>, AppError> {
        Ok(self
            .data
            .read()
            .await
            .copies
            .iter()
            .filter(|m| m.copy.barcode == barcode)
            .cloned()
            .collect())
    }

    async fn get_book(&self, book_id: &str) -> Result<Option<Book>, AppError> {
        Ok(self.data.read().await.books.get(book_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Condition;
    use serde_json::json;

    fn record(copy: &str) -> CheckoutRecord {
        CheckoutRecord {
            book: "book-1".to_string(),
            copy: copy.to_string(),
            user: "patron-1".to_string(),
            checked_out_by: "staff-1".to_string(),
            time_out: "2026-01-01T00:00:00Z".to_string(),
            time_in: None,
            condition_out: Condition::Good,
            condition_in: None,
        }
    }

    #[tokio::test]
    async fn commit_creates_profile_for_patron_without_one() {
        let db = MemoryDb::new();
        let checkout = NewCheckout {
            id: "c1".to_string(),
            record: record("copy-1"),
        };

        db.commit_checkouts("patron-1", &[checkout]).await.unwrap();

        let patron = db.get_patron("patron-1").await.unwrap().unwrap();
        let info = patron.checkout_info().unwrap();
        assert!(info.active_checkouts.contains("c1"));
        assert_eq!(info.max_checkouts, 3);
    }

    #[tokio::test]
    async fn failed_commit_leaves_nothing_behind() {
        let db = MemoryDb::new();
        db.fail_next_commit();

        let checkouts = vec![
            NewCheckout {
                id: "c1".to_string(),
                record: record("copy-1"),
            },
            NewCheckout {
                id: "c2".to_string(),
                record: record("copy-2"),
            },
        ];
        assert!(db.commit_checkouts("patron-1", &checkouts).await.is_err());
        assert_eq!(db.checkout_count().await, 0);
        assert!(db.get_patron("patron-1").await.unwrap().is_none());

        // Only the next commit fails.
        db.commit_checkouts("patron-1", &checkouts).await.unwrap();
        assert_eq!(db.checkout_count().await, 2);
        assert_eq!(db.commit_attempts(), 2);
    }

    #[tokio::test]
    async fn id_collision_aborts_whole_commit() {
        let db = MemoryDb::new();
        let first = NewCheckout {
            id: "c1".to_string(),
            record: record("copy-1"),
        };
        db.commit_checkouts("patron-1", &[first.clone()]).await.unwrap();

        let batch = vec![
            NewCheckout {
                id: "c2".to_string(),
                record: record("copy-2"),
            },
            first,
        ];
        assert!(db.commit_checkouts("patron-1", &batch).await.is_err());
        assert!(db.get_checkout("c2").await.unwrap().is_none());

        let info = db
            .get_patron("patron-1")
            .await
            .unwrap()
            .unwrap()
            .checkout_info()
            .unwrap();
        assert_eq!(info.active_count(), 1);
    }

    #[test]
    fn union_skips_ids_already_present() {
        let mut patron: Patron = serde_json::from_value(json!({
            "checkoutInfo": { "activeCheckouts": ["c1"], "maxCheckouts": 5 }
        }))
        .unwrap();

        union_active_checkouts(&mut patron, &["c1".to_string(), "c2".to_string()]);

        let info = patron.checkout_info().unwrap();
        assert_eq!(info.active_count(), 2);
        assert_eq!(info.max_checkouts, 5);
    }
}
