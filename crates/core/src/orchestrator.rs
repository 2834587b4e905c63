use crate::deletion::delete_document;
use crate::error::PipelineError;
use crate::extractor::{LopdfExtractor, PdfExtractor};
use crate::frequency::{count_filtered_words, top_five, TopFive};
use crate::ingest::{discover_pdf_files, ingest_document, IngestionReport, SkippedPdf, Upload};
use crate::lexical::{count_occurrences, search_documents, Keyword};
use crate::renderer::{render_page, PageRasterizer, PdftoppmRasterizer};
use crate::traits::{BlobStore, RecordStore};
use crate::{DocumentRecord, IngestionOptions, KeywordSearch, OccurrenceReport, Sentence};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Every document operation, over one blob store and one record store.
pub struct DocumentService<B, R>
where
    B: BlobStore,
    R: RecordStore,
{
    blobs: B,
    records: R,
    extractor: Arc<dyn PdfExtractor>,
    rasterizer: Arc<dyn PageRasterizer>,
    options: IngestionOptions,
}

impl<B, R> DocumentService<B, R>
where
    B: BlobStore,
    R: RecordStore,
{
    pub fn new(blobs: B, records: R) -> Self {
        Self {
            blobs,
            records,
            extractor: Arc::new(LopdfExtractor),
            rasterizer: Arc::new(PdftoppmRasterizer::default()),
            options: IngestionOptions::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PdfExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_options(mut self, options: IngestionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    pub fn options(&self) -> &IngestionOptions {
        &self.options
    }

    pub async fn upload(
        &self,
        name: &str,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Result<DocumentRecord, PipelineError> {
        self.ingest(Upload::new(name, bytes)).await
    }

    pub async fn upload_path(&self, path: &Path) -> Result<DocumentRecord, PipelineError> {
        self.ingest(Upload::from_path(path)?).await
    }

    async fn ingest(&self, upload: Upload) -> Result<DocumentRecord, PipelineError> {
        ingest_document(
            &self.blobs,
            &self.records,
            Arc::clone(&self.extractor),
            &self.options,
            upload,
        )
        .await
    }

    /// Ingests every PDF under `folder`, skipping the ones that fail.
    pub async fn ingest_folder(&self, folder: &Path) -> IngestionReport {
        let mut report = IngestionReport::default();

        for path in discover_pdf_files(folder) {
            match self.upload_path(&path).await {
                Ok(record) => report.ingested.push(record),
                Err(error) => {
                    warn!(path = %path.display(), %error, "skipping pdf");
                    report.skipped.push(SkippedPdf {
                        path,
                        reason: error.to_string(),
                    });
                }
            }
        }

        report
    }

    /// All records, ordered by name.
    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>, PipelineError> {
        self.records
            .list_records()
            .await
            .map_err(|error| PipelineError::storage("failed to list documents", error))
    }

    pub async fn get_document(&self, document_id: i64) -> Result<DocumentRecord, PipelineError> {
        self.records
            .get_record(document_id)
            .await
            .map_err(|error| PipelineError::from_lookup(document_id, "failed to load the record", error))
    }

    /// The stored PDF bytes and the name they were uploaded under.
    pub async fn download(&self, document_id: i64) -> Result<(String, Vec<u8>), PipelineError> {
        let record = self.get_document(document_id).await?;
        let bytes = self
            .blobs
            .get(&self.options.bucket, &record.name)
            .await
            .map_err(|error| PipelineError::storage("failed to fetch the pdf", error))?;
        Ok((record.name, bytes))
    }

    /// JPEG of the 1-based `page_number` of a stored document.
    pub async fn render_page(
        &self,
        document_id: i64,
        page_number: i64,
    ) -> Result<Vec<u8>, PipelineError> {
        let (name, bytes) = self.download(document_id).await?;
        debug!(document_id, %name, page_number, "rendering page");
        render_page(self.rasterizer.as_ref(), &bytes, page_number).await
    }

    pub async fn list_sentences(&self, document_id: i64) -> Result<Vec<Sentence>, PipelineError> {
        self.get_document(document_id).await?;
        self.document_sentences(document_id).await
    }

    async fn document_sentences(&self, document_id: i64) -> Result<Vec<Sentence>, PipelineError> {
        self.records
            .list_record_sentences(document_id)
            .await
            .map_err(|error| PipelineError::storage("failed to list sentences", error))
    }

    /// Whole-word search over every stored sentence, grouped by document in
    /// name order.
    pub async fn search_keyword(&self, raw_keyword: &str) -> Result<KeywordSearch, PipelineError> {
        let keyword = parse_keyword(raw_keyword)?;
        let documents = self.list_documents().await?;

        let mut by_document = Vec::with_capacity(documents.len());
        for document in documents {
            let sentences = self.document_sentences(document.id).await?;
            by_document.push((document.id, sentences));
        }

        Ok(search_documents(&keyword, by_document))
    }

    pub async fn occurrences(
        &self,
        document_id: i64,
        raw_keyword: &str,
    ) -> Result<OccurrenceReport, PipelineError> {
        let keyword = parse_keyword(raw_keyword)?;
        let sentences = self.list_sentences(document_id).await?;
        Ok(count_occurrences(&keyword, &sentences))
    }

    /// Five most frequent non-stopword words of a document.
    pub async fn top_words(&self, document_id: i64) -> Result<TopFive, PipelineError> {
        let sentences = self.list_sentences(document_id).await?;
        let text = sentences
            .iter()
            .map(|sentence| sentence.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(top_five(&count_filtered_words(&text)))
    }

    pub async fn delete(&self, document_id: i64) -> Result<(), PipelineError> {
        delete_document(
            &self.blobs,
            &self.records,
            &self.options.bucket,
            document_id,
        )
        .await
    }
}

fn parse_keyword(raw: &str) -> Result<Keyword, PipelineError> {
    Keyword::parse(raw).ok_or_else(|| PipelineError::Validation("keyword is empty".to_string()))
}
