//! Storage layer: where email documents live and how their category is written back.

mod error;
pub use error::StoreError;

mod memory;
pub use memory::MemoryStore;

#[cfg(feature = "http")]
pub mod firestore;
#[cfg(feature = "http")]
pub use firestore::{FirestoreClient, FirestoreConfig, TokenSource};

use mailsort_core::{EmailKey, EmailRecord};

/// Email document access used by the classification handler.
#[async_trait::async_trait]
pub trait EmailStore: Send + Sync {
    /// Fetch one email, `None` if the document does not exist.
    async fn get(&self, key: &EmailKey) -> Result<Option<EmailRecord>, StoreError>;

    /// Partial update: set (or overwrite) the `category` field and nothing else.
    ///
    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    async fn set_category(&self, key: &EmailKey, category: &str) -> Result<(), StoreError>;
}
