//! In-process email store for tests and dry runs.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use mailsort_core::{EmailKey, EmailRecord};
use tracing::debug;

use crate::{EmailStore, StoreError};

/// Email documents held in a map, with switchable write failures.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<EmailKey, EmailRecord>>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record, as the ingestion side would.
    pub fn insert(&self, key: EmailKey, record: EmailRecord) {
        self.lock().insert(key, record);
    }

    /// Snapshot of one record.
    pub fn record(&self, key: &EmailKey) -> Option<EmailRecord> {
        self.lock().get(key).cloned()
    }

    /// Make every subsequent `set_category` fail without touching data.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful `set_category` calls.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EmailKey, EmailRecord>> {
        // A poisoned map is still a consistent map: every mutation is a single insert.
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl EmailStore for MemoryStore {
    async fn get(&self, key: &EmailKey) -> Result<Option<EmailRecord>, StoreError> {
        Ok(self.record(key))
    }

    async fn set_category(&self, key: &EmailKey, category: &str) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Other(format!(
                "injected write failure for {}",
                key.document_path()
            )));
        }

        let mut records = self.lock();
        let record = records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(key.document_path()))?;
        record.category = Some(category.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        debug!(key = %key, category, "category stored");
        Ok(())
    }
}
