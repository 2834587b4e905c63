use crate::error::PipelineError;
use crate::traits::{BlobStore, RecordStore};
use tracing::{error, info, warn};

/// Removes a document's blob and then its record (sentences cascade).
///
/// The blob bytes are read first so that a failed record delete can put them
/// back; `RecordDelete::restored` reports whether that worked.
pub async fn delete_document(
    blobs: &dyn BlobStore,
    records: &dyn RecordStore,
    bucket: &str,
    document_id: i64,
) -> Result<(), PipelineError> {
    let record = records
        .get_record(document_id)
        .await
        .map_err(|error| PipelineError::from_lookup(document_id, "failed to load the record", error))?;

    let saved = blobs
        .get(bucket, &record.name)
        .await
        .map_err(PipelineError::BlobDelete)?;

    blobs
        .delete(bucket, &record.name)
        .await
        .map_err(PipelineError::BlobDelete)?;

    if let Err(source) = records.delete_record(document_id).await {
        warn!(document_id, error = %source, "record delete failed, restoring blob");
        let restored = match blobs.put(bucket, &record.name, &saved).await {
            Ok(()) => true,
            Err(restore_error) => {
                error!(
                    document_id,
                    key = %record.name,
                    error = %restore_error,
                    "blob could not be restored after a failed record delete"
                );
                false
            }
        };
        return Err(PipelineError::RecordDelete { source, restored });
    }

    info!(document_id, name = %record.name, "document deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::{InMemoryBlobStore, InMemoryRecordStore};
    use crate::StoreError;

    async fn seeded() -> Result<(InMemoryBlobStore, InMemoryRecordStore, i64), StoreError> {
        let blobs = InMemoryBlobStore::new();
        let records = InMemoryRecordStore::new();
        blobs.put("pdf", "doc.pdf", b"%PDF-1.4 doc").await?;
        let record = records.create_record("doc.pdf", 1, 12).await?;
        records.create_sentence("Only sentence.", record.id).await?;
        Ok((blobs, records, record.id))
    }

    #[tokio::test]
    async fn removes_blob_record_and_sentences() -> Result<(), Box<dyn std::error::Error>> {
        let (blobs, records, id) = seeded().await?;

        delete_document(&blobs, &records, "pdf", id).await?;

        assert!(blobs.is_empty());
        assert!(records.list_records().await?.is_empty());
        assert!(records.list_sentences().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_document_is_not_found() {
        let blobs = InMemoryBlobStore::new();
        let records = InMemoryRecordStore::new();
        let result = delete_document(&blobs, &records, "pdf", 404).await;
        assert!(matches!(result, Err(PipelineError::NotFound(404))));
    }

    #[tokio::test]
    async fn failed_blob_delete_leaves_everything_in_place() -> Result<(), Box<dyn std::error::Error>> {
        let (blobs, records, id) = seeded().await?;
        blobs.fail_deletes(true);

        let result = delete_document(&blobs, &records, "pdf", id).await;

        assert!(matches!(result, Err(PipelineError::BlobDelete(_))));
        assert!(blobs.contains("pdf", "doc.pdf"));
        assert_eq!(records.list_record_sentences(id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn missing_blob_is_a_blob_delete_error() -> Result<(), Box<dyn std::error::Error>> {
        let blobs = InMemoryBlobStore::new();
        let records = InMemoryRecordStore::new();
        let record = records.create_record("doc.pdf", 1, 12).await?;

        let result = delete_document(&blobs, &records, "pdf", record.id).await;

        assert!(matches!(
            result,
            Err(PipelineError::BlobDelete(StoreError::NotFound(_)))
        ));
        assert_eq!(records.get_record(record.id).await?.name, "doc.pdf");
        Ok(())
    }

    #[tokio::test]
    async fn failed_record_delete_restores_the_blob() -> Result<(), Box<dyn std::error::Error>> {
        let (blobs, records, id) = seeded().await?;
        records.fail_record_deletes(true);

        let result = delete_document(&blobs, &records, "pdf", id).await;

        assert!(matches!(
            result,
            Err(PipelineError::RecordDelete { restored: true, .. })
        ));
        assert_eq!(blobs.get("pdf", "doc.pdf").await?, b"%PDF-1.4 doc".to_vec());
        assert_eq!(records.get_record(id).await?.name, "doc.pdf");
        Ok(())
    }

    #[tokio::test]
    async fn unrestorable_blob_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let (blobs, records, id) = seeded().await?;
        records.fail_record_deletes(true);
        blobs.fail_puts(true);

        let result = delete_document(&blobs, &records, "pdf", id).await;

        assert!(matches!(
            result,
            Err(PipelineError::RecordDelete { restored: false, .. })
        ));
        assert!(!blobs.contains("pdf", "doc.pdf"));
        Ok(())
    }
}
