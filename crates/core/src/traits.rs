use crate::{DocumentRecord, Sentence, StoreError};
use async_trait::async_trait;

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores a new object. An existing object under `key` is never
    /// overwritten; the put fails with `StoreError::Conflict` instead.
    async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<(), StoreError>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError>;
}

/// Relational storage for document records and their sentences.
///
/// `list_records` is ordered by name and `list_record_sentences` by insertion.
/// Deleting a record removes its sentences.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_record(
        &self,
        name: &str,
        num_pages: u32,
        size: u64,
    ) -> Result<DocumentRecord, StoreError>;

    async fn get_record(&self, id: i64) -> Result<DocumentRecord, StoreError>;

    async fn list_records(&self) -> Result<Vec<DocumentRecord>, StoreError>;

    async fn delete_record(&self, id: i64) -> Result<(), StoreError>;

    async fn create_sentence(&self, text: &str, record_id: i64) -> Result<Sentence, StoreError>;

    async fn list_sentences(&self) -> Result<Vec<Sentence>, StoreError>;

    async fn list_record_sentences(&self, record_id: i64) -> Result<Vec<Sentence>, StoreError>;
}
