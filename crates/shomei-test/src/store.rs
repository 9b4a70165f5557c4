use async_trait::async_trait;
use iso8601_timestamp::Timestamp;
use shomei_db::model::signatory::{hash_key_id, Signatory};
use shomei_signatory::{SignatoryStore, StoreError};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

/// Hermetic [`SignatoryStore`] with the same duplicate/update semantics as
/// the Postgres-backed one
#[derive(Default)]
pub struct InMemorySignatoryStore {
    rows: Mutex<HashMap<String, Signatory>>,
    insert_calls: AtomicUsize,
}

impl InMemorySignatoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times `insert` was attempted
    pub fn insert_count(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SignatoryStore for InMemorySignatoryStore {
    async fn get_by_key_id(&self, key_id: &str) -> Result<Option<Signatory>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows.get(&hash_key_id(key_id)).cloned())
    }

    async fn get_by_host_account(
        &self,
        host: &str,
        account: &str,
    ) -> Result<Option<Signatory>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .find(|signatory| signatory.host == host && signatory.account == account)
            .cloned())
    }

    async fn insert(&self, signatory: &Signatory) -> Result<(), StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);

        let mut rows = self.rows.lock().unwrap();
        let key = hash_key_id(&signatory.key_id);
        if rows.contains_key(&key) {
            return Err(StoreError::Duplicate);
        }

        rows.insert(key, signatory.clone());
        Ok(())
    }

    async fn update_public_key(&self, signatory: &Signatory) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(&hash_key_id(&signatory.key_id)) {
            row.public_key = signatory.public_key.clone();
            row.updated_at = Timestamp::now_utc();
        }

        Ok(())
    }

    async fn update_metadata(&self, signatory: &Signatory) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(row) = rows.get_mut(&hash_key_id(&signatory.key_id)) {
            row.metadata = signatory.metadata.clone();
            row.updated_at = Timestamp::now_utc();
        }

        Ok(())
    }

    async fn delete(&self, key_id: &str) -> Result<(), StoreError> {
        let mut rows = self.rows.lock().unwrap();
        rows.remove(&hash_key_id(key_id));
        Ok(())
    }
}
