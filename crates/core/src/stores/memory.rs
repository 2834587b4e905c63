//! In-memory [`BlobStore`] and [`RecordStore`] implementations.
//!
//! Used by tests and by one-shot CLI runs. Both keep their state behind
//! `std::sync::RwLock`; no lock is held across an `.await`. Each store can be
//! told to fail specific operations so partial-failure paths can be exercised.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use crate::traits::{BlobStore, RecordStore};
use crate::{DocumentRecord, Sentence, StoreError};

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Request("in-memory store lock poisoned".to_string())
}

#[derive(Default)]
pub struct InMemoryBlobStore {
    objects: RwLock<HashMap<(String, String), Vec<u8>>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .read()
            .map(|objects| objects.contains_key(&(bucket.to_string(), key.to_string())))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<(), StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(StoreError::Request(format!("put {bucket}/{key} rejected")));
        }
        let mut objects = self.objects.write().map_err(poisoned)?;
        match objects.entry((bucket.to_string(), key.to_string())) {
            Entry::Occupied(_) => Err(StoreError::Conflict(format!(
                "object {bucket}/{key} already exists"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(data.to_vec());
                Ok(())
            }
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let objects = self.objects.read().map_err(poisoned)?;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("object {bucket}/{key}")))
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Request(format!("delete {bucket}/{key} rejected")));
        }
        let mut objects = self.objects.write().map_err(poisoned)?;
        objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordState {
    last_record_id: i64,
    last_sentence_id: i64,
    records: BTreeMap<i64, DocumentRecord>,
    sentences: Vec<Sentence>,
}

#[derive(Debug, Default)]
struct FaultPlan {
    fail_record_deletes: bool,
    sentence_inserts_left: Option<usize>,
}

#[derive(Default)]
pub struct InMemoryRecordStore {
    state: RwLock<RecordState>,
    faults: Mutex<FaultPlan>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_record_deletes(&self, fail: bool) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_record_deletes = fail;
        }
    }

    /// Lets `successful` more sentence inserts through, then rejects the rest.
    pub fn fail_sentence_inserts_after(&self, successful: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.sentence_inserts_left = Some(successful);
        }
    }

    fn take_sentence_budget(&self) -> Result<(), StoreError> {
        let mut faults = self.faults.lock().map_err(poisoned)?;
        match faults.sentence_inserts_left.as_mut() {
            Some(0) => Err(StoreError::Request("sentence insert rejected".to_string())),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn create_record(
        &self,
        name: &str,
        num_pages: u32,
        size: u64,
    ) -> Result<DocumentRecord, StoreError> {
        let mut state = self.state.write().map_err(poisoned)?;
        if state.records.values().any(|record| record.name == name) {
            return Err(StoreError::Conflict(format!("record named {name} already exists")));
        }

        state.last_record_id += 1;
        let record = DocumentRecord {
            id: state.last_record_id,
            name: name.to_string(),
            num_pages,
            size,
            created_at: Utc::now(),
        };
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_record(&self, id: i64) -> Result<DocumentRecord, StoreError> {
        let state = self.state.read().map_err(poisoned)?;
        state
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("record {id}")))
    }

    async fn list_records(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let state = self.state.read().map_err(poisoned)?;
        let mut records: Vec<_> = state.records.values().cloned().collect();
        records.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(records)
    }

    async fn delete_record(&self, id: i64) -> Result<(), StoreError> {
        if self.faults.lock().map_err(poisoned)?.fail_record_deletes {
            return Err(StoreError::Request(format!("delete of record {id} rejected")));
        }

        let mut state = self.state.write().map_err(poisoned)?;
        if state.records.remove(&id).is_none() {
            return Err(StoreError::NotFound(format!("record {id}")));
        }
        state.sentences.retain(|sentence| sentence.document_id != id);
        Ok(())
    }

    async fn create_sentence(&self, text: &str, record_id: i64) -> Result<Sentence, StoreError> {
        self.take_sentence_budget()?;

        let mut state = self.state.write().map_err(poisoned)?;
        if !state.records.contains_key(&record_id) {
            return Err(StoreError::Conflict(format!(
                "sentence references unknown record {record_id}"
            )));
        }

        state.last_sentence_id += 1;
        let sentence = Sentence {
            id: state.last_sentence_id,
            text: text.to_string(),
            document_id: record_id,
        };
        state.sentences.push(sentence.clone());
        Ok(sentence)
    }

    async fn list_sentences(&self) -> Result<Vec<Sentence>, StoreError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state.sentences.clone())
    }

    async fn list_record_sentences(&self, record_id: i64) -> Result<Vec<Sentence>, StoreError> {
        let state = self.state.read().map_err(poisoned)?;
        Ok(state
            .sentences
            .iter()
            .filter(|sentence| sentence.document_id == record_id)
            .cloned()
            .collect())
    }
}
