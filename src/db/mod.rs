//! Database layer (Firestore, plus an in-memory store for tests).

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{Book, CheckoutRecord, CopyMatch, NewCheckout, Patron};
use async_trait::async_trait;
use rand::{distributions::Alphanumeric, Rng};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const CHECKOUTS: &str = "checkouts";
    pub const BOOKS: &str = "books";
    /// Nested under each book; queried as a collection group
    pub const COPIES: &str = "copies";
}

/// Field path of a patron's active checkout ids.
pub const ACTIVE_CHECKOUTS_PATH: &str = "checkoutInfo.activeCheckouts";

const AUTO_ID_LEN: usize = 20;

/// Generate a Firestore-style auto id for a new document.
pub fn new_document_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LEN)
        .map(char::from)
        .collect()
}

/// Persistent state the checkout flow reads and writes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CheckoutStore: Send + Sync {
    /// Patron document by uid.
    async fn get_patron(&self, uid: &str) -> Result<Option<Patron>, AppError>;

    /// Create every checkout record and add their ids to the patron's
    /// active set, all in one commit. Either everything is applied or nothing.
    async fn commit_checkouts(
        &self,
        patron_uid: &str,
        checkouts: &[NewCheckout],
    ) -> Result<(), AppError>;

    async fn get_checkout(&self, checkout_id: &str) -> Result<Option<CheckoutRecord>, AppError>;

    /// Copies whose barcode matches, across all books.
    async fn find_copies_by_barcode(&self, barcode: &str) -> Result<Vec<CopyMatch>, AppError>;

    async fn get_book(&self, book_id: &str) -> Result<Option<Book>, AppError>;
}
