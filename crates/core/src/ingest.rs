use crate::error::{ExtractError, PipelineError};
use crate::extractor::PdfExtractor;
use crate::traits::{BlobStore, RecordStore};
use crate::{DocumentRecord, IngestionOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

pub fn validate_blob_key(key: &str) -> Result<(), PipelineError> {
    if key.trim().is_empty() {
        return Err(PipelineError::Validation("file name is empty".to_string()));
    }
    if key.contains('/') || key.contains('\\') {
        return Err(PipelineError::Validation(format!(
            "file name {key} must not contain a path separator"
        )));
    }
    Ok(())
}

/// One PDF to ingest.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    pub bytes: Arc<[u8]>,
    pub size: u64,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                PipelineError::Validation(format!("path has no file name: {}", path.display()))
            })?;
        let bytes = std::fs::read(path).map_err(ExtractError::Io)?;
        Ok(Self::new(name, bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompletedStep {
    BlobStored,
    RecordCreated(i64),
}

/// Completed ingestion steps, undone in reverse when a later step fails.
struct IngestSaga<'a> {
    blobs: &'a dyn BlobStore,
    records: &'a dyn RecordStore,
    bucket: &'a str,
    key: &'a str,
    completed: Vec<CompletedStep>,
}

impl<'a> IngestSaga<'a> {
    fn new(
        blobs: &'a dyn BlobStore,
        records: &'a dyn RecordStore,
        bucket: &'a str,
        key: &'a str,
    ) -> Self {
        Self {
            blobs,
            records,
            bucket,
            key,
            completed: Vec::new(),
        }
    }

    fn record(&mut self, step: CompletedStep) {
        self.completed.push(step);
    }

    /// Runs every undo action and hands back `error` unchanged.
    async fn abort(mut self, error: PipelineError) -> PipelineError {
        warn!(key = %self.key, %error, "ingestion failed, rolling back");

        while let Some(step) = self.completed.pop() {
            match step {
                CompletedStep::RecordCreated(id) => {
                    if let Err(undo_error) = self.records.delete_record(id).await {
                        warn!(document_id = id, %undo_error, "rollback could not delete record");
                    }
                }
                CompletedStep::BlobStored => {
                    if let Err(undo_error) = self.blobs.delete(self.bucket, self.key).await {
                        warn!(key = %self.key, %undo_error, "rollback could not delete blob");
                    }
                }
            }
        }

        error
    }
}

async fn ensure_name_is_free(records: &dyn RecordStore, key: &str) -> Result<(), PipelineError> {
    let existing = records
        .list_records()
        .await
        .map_err(|error| PipelineError::storage("failed to check existing documents", error))?;

    if existing.iter().any(|record| record.name == key) {
        return Err(PipelineError::storage(
            "failed to upload the file",
            crate::StoreError::Conflict(format!("a document named {key} already exists")),
        ));
    }
    Ok(())
}

/// Stores the blob, extracts and records the document, then stores its
/// sentences. Any failure after the first write undoes what was written.
pub async fn ingest_document(
    blobs: &dyn BlobStore,
    records: &dyn RecordStore,
    extractor: Arc<dyn PdfExtractor>,
    options: &IngestionOptions,
    upload: Upload,
) -> Result<DocumentRecord, PipelineError> {
    validate_blob_key(&upload.name)?;
    if upload.bytes.is_empty() {
        return Err(PipelineError::Validation(format!(
            "file {} is empty",
            upload.name
        )));
    }
    ensure_name_is_free(records, &upload.name).await?;

    let key = upload.name.as_str();
    let mut saga = IngestSaga::new(blobs, records, &options.bucket, key);

    blobs
        .put(&options.bucket, key, &upload.bytes)
        .await
        .map_err(|error| PipelineError::storage("failed to upload the file to the blob store", error))?;
    saga.record(CompletedStep::BlobStored);
    debug!(key = %key, bucket = %options.bucket, "blob stored");

    let bytes = Arc::clone(&upload.bytes);
    let extracted = tokio::task::spawn_blocking(move || extractor.extract(&bytes)).await;
    let extracted = match extracted {
        Ok(Ok(extracted)) => extracted,
        Ok(Err(error)) => return Err(saga.abort(error.into()).await),
        Err(join_error) => {
            let error = ExtractError::Task(join_error.to_string()).into();
            return Err(saga.abort(error).await);
        }
    };

    let record = match records
        .create_record(key, extracted.page_count, upload.size)
        .await
    {
        Ok(record) => record,
        Err(error) => {
            let error = PipelineError::storage("failed to create a record for the file", error);
            return Err(saga.abort(error).await);
        }
    };
    saga.record(CompletedStep::RecordCreated(record.id));

    let sentences = options.segmentation.split(&extracted.text);
    for sentence in &sentences {
        if let Err(error) = records.create_sentence(sentence, record.id).await {
            let error = PipelineError::storage("failed to add a sentence to the database", error);
            return Err(saga.abort(error).await);
        }
    }

    info!(
        document_id = record.id,
        name = %record.name,
        pages = record.num_pages,
        sentences = sentences.len(),
        "document ingested"
    );
    Ok(record)
}

#[derive(Debug)]
pub struct SkippedPdf {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a best-effort folder ingest.
#[derive(Debug, Default)]
pub struct IngestionReport {
    pub ingested: Vec<DocumentRecord>,
    pub skipped: Vec<SkippedPdf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractedPdf;
    use crate::stores::{InMemoryBlobStore, InMemoryRecordStore};
    use crate::{SegmentationPolicy, StoreError};
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    struct FixedExtractor {
        pages: u32,
        text: &'static str,
    }

    impl PdfExtractor for FixedExtractor {
        fn extract(&self, _pdf: &[u8]) -> Result<ExtractedPdf, ExtractError> {
            Ok(ExtractedPdf {
                page_count: self.pages,
                text: self.text.to_string(),
            })
        }
    }

    struct SlowExtractor;

    impl PdfExtractor for SlowExtractor {
        fn extract(&self, _pdf: &[u8]) -> Result<ExtractedPdf, ExtractError> {
            std::thread::sleep(std::time::Duration::from_millis(50));
            Ok(ExtractedPdf {
                page_count: 1,
                text: "Slow text.".to_string(),
            })
        }
    }

    struct BrokenExtractor;

    impl PdfExtractor for BrokenExtractor {
        fn extract(&self, _pdf: &[u8]) -> Result<ExtractedPdf, ExtractError> {
            Err(ExtractError::PdfParse("no xref table".to_string()))
        }
    }

    fn upload(name: &str) -> Upload {
        Upload::new(name, b"%PDF-1.4 body".to_vec())
    }

    #[test]
    fn discover_pdf_files_is_recursive() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("a.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("b.PDF"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn blob_keys_must_be_plain_file_names() {
        assert!(validate_blob_key("doc.pdf").is_ok());
        assert!(matches!(validate_blob_key("  "), Err(PipelineError::Validation(_))));
        assert!(matches!(
            validate_blob_key("../doc.pdf"),
            Err(PipelineError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn stores_record_and_every_sentence() -> Result<(), PipelineError> {
        let blobs = InMemoryBlobStore::new();
        let records = InMemoryRecordStore::new();
        let extractor = Arc::new(FixedExtractor {
            pages: 3,
            text: "One fish. Two fish.\n\nRed fish.",
        });

        let record = ingest_document(
            &blobs,
            &records,
            extractor,
            &IngestionOptions::default(),
            upload("fish.pdf"),
        )
        .await?;

        assert_eq!(record.num_pages, 3);
        assert_eq!(record.size, 13);
        assert!(blobs.contains("pdf", "fish.pdf"));
        let stored = records
            .list_record_sentences(record.id)
            .await
            .map_err(|error| PipelineError::storage("list", error))?;
        let texts: Vec<_> = stored.iter().map(|sentence| sentence.text.as_str()).collect();
        assert_eq!(texts, vec!["One fish.", "Two fish.", "Red fish."]);
        Ok(())
    }

    #[tokio::test]
    async fn period_fallback_stores_the_same_number_of_segments() -> Result<(), PipelineError> {
        let blobs = InMemoryBlobStore::new();
        let records = InMemoryRecordStore::new();
        let options = IngestionOptions {
            segmentation: SegmentationPolicy::Period,
            ..IngestionOptions::default()
        };
        let extractor = Arc::new(FixedExtractor {
            pages: 1,
            text: "One fish. Two fish. Red fish.",
        });

        let record = ingest_document(&blobs, &records, extractor, &options, upload("fish.pdf")).await?;
        let stored = records
            .list_record_sentences(record.id)
            .await
            .map_err(|error| PipelineError::storage("list", error))?;
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[0].text, "One fish");
        Ok(())
    }

    #[tokio::test]
    async fn extraction_failure_removes_the_uploaded_blob() {
        let blobs = InMemoryBlobStore::new();
        let records = InMemoryRecordStore::new();

        let result = ingest_document(
            &blobs,
            &records,
            Arc::new(BrokenExtractor),
            &IngestionOptions::default(),
            upload("broken.pdf"),
        )
        .await;

        assert!(matches!(result, Err(PipelineError::Extraction(_))));
        assert!(blobs.is_empty());
        assert!(records.list_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_sentence_insert_rolls_back_record_and_blob() {
        let blobs = InMemoryBlobStore::new();
        let records = InMemoryRecordStore::new();
        records.fail_sentence_inserts_after(1);
        let extractor = Arc::new(FixedExtractor {
            pages: 1,
            text: "Kept for a moment. Rejected.",
        });

        let result = ingest_document(
            &blobs,
            &records,
            extractor,
            &IngestionOptions::default(),
            upload("partial.pdf"),
        )
        .await;

        assert!(matches!(result, Err(PipelineError::Storage { .. })));
        assert!(blobs.is_empty());
        assert!(records.list_records().await.unwrap().is_empty());
        assert!(records.list_sentences().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_blob_put_writes_nothing() {
        let blobs = InMemoryBlobStore::new();
        blobs.fail_puts(true);
        let records = InMemoryRecordStore::new();
        let extractor = Arc::new(FixedExtractor { pages: 1, text: "Hi." });

        let result = ingest_document(
            &blobs,
            &records,
            extractor,
            &IngestionOptions::default(),
            upload("doc.pdf"),
        )
        .await;

        assert!(matches!(result, Err(PipelineError::Storage { .. })));
        assert!(records.list_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_name_keeps_the_existing_document() {
        let blobs = InMemoryBlobStore::new();
        let records = InMemoryRecordStore::new();
        let extractor = Arc::new(FixedExtractor { pages: 1, text: "Hi." });
        let options = IngestionOptions::default();

        let first = ingest_document(&blobs, &records, extractor.clone(), &options, upload("doc.pdf"))
            .await
            .unwrap();
        let second = ingest_document(
            &blobs,
            &records,
            extractor,
            &options,
            Upload::new("doc.pdf", b"%PDF other".to_vec()),
        )
        .await;

        assert!(matches!(second, Err(PipelineError::Storage { .. })));
        assert_eq!(blobs.get("pdf", "doc.pdf").await.unwrap(), b"%PDF-1.4 body".to_vec());
        assert_eq!(records.get_record(first.id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn concurrent_same_name_uploads_keep_the_winner_intact() {
        let blobs = InMemoryBlobStore::new();
        let records = InMemoryRecordStore::new();
        let options = IngestionOptions::default();

        let (first, second) = tokio::join!(
            ingest_document(
                &blobs,
                &records,
                Arc::new(SlowExtractor),
                &options,
                Upload::new("doc.pdf", b"%PDF first".to_vec()),
            ),
            ingest_document(
                &blobs,
                &records,
                Arc::new(SlowExtractor),
                &options,
                Upload::new("doc.pdf", b"%PDF second".to_vec()),
            ),
        );

        assert_eq!(u8::from(first.is_ok()) + u8::from(second.is_ok()), 1);
        let (winner, loser, winning_bytes) = match (first, second) {
            (Ok(record), Err(error)) => (record, error, b"%PDF first".to_vec()),
            (Err(error), Ok(record)) => (record, error, b"%PDF second".to_vec()),
            _ => unreachable!("exactly one upload succeeds"),
        };
        assert!(matches!(
            loser,
            PipelineError::Storage {
                source: StoreError::Conflict(_),
                ..
            }
        ));
        assert_eq!(records.list_records().await.unwrap(), vec![winner]);
        assert_eq!(blobs.get("pdf", "doc.pdf").await.unwrap(), winning_bytes);
    }

    #[tokio::test]
    async fn unrecorded_object_under_the_same_key_is_left_alone() {
        let blobs = InMemoryBlobStore::new();
        blobs.put("pdf", "doc.pdf", b"%PDF stray").await.unwrap();
        let records = InMemoryRecordStore::new();
        let extractor = Arc::new(FixedExtractor { pages: 1, text: "Hi." });

        let result = ingest_document(
            &blobs,
            &records,
            extractor,
            &IngestionOptions::default(),
            upload("doc.pdf"),
        )
        .await;

        assert!(matches!(
            result,
            Err(PipelineError::Storage {
                source: StoreError::Conflict(_),
                ..
            })
        ));
        assert_eq!(blobs.get("pdf", "doc.pdf").await.unwrap(), b"%PDF stray".to_vec());
        assert!(records.list_records().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_payload_is_a_validation_error() {
        let blobs = InMemoryBlobStore::new();
        let records = InMemoryRecordStore::new();
        let result = ingest_document(
            &blobs,
            &records,
            Arc::new(BrokenExtractor),
            &IngestionOptions::default(),
            Upload::new("empty.pdf", Vec::new()),
        )
        .await;

        assert!(matches!(result, Err(PipelineError::Validation(_))));
        assert!(blobs.is_empty());
    }
}
