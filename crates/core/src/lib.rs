pub mod deletion;
pub mod error;
pub mod extractor;
pub mod frequency;
pub mod ingest;
pub mod lexical;
pub mod models;
pub mod orchestrator;
pub mod renderer;
pub mod segmenter;
pub mod stores;
pub mod traits;

pub use deletion::delete_document;
pub use error::{ExtractError, PipelineError, RenderError, StoreError};
pub use extractor::{count_pages, LopdfExtractor, PdfExtractor};
pub use frequency::{count_filtered_words, is_stopword, top_five, TopFive, WordFrequencies};
pub use ingest::{
    discover_pdf_files, ingest_document, validate_blob_key, IngestionReport, SkippedPdf, Upload,
};
pub use lexical::{count_occurrences, matching_sentences, search_documents, Keyword};
pub use models::{
    DocumentMatches, DocumentRecord, ExtractedPdf, IngestionOptions, KeywordSearch,
    OccurrenceReport, RankedWord, RenderOptions, Sentence, DEFAULT_BUCKET,
};
pub use orchestrator::DocumentService;
pub use renderer::{page_index, render_page, PageRasterizer, PdftoppmRasterizer};
pub use segmenter::{normalize_whitespace, SegmentationPolicy};
pub use stores::{InMemoryBlobStore, InMemoryRecordStore, S3BlobStore, S3Credentials, SqliteRecordStore};
pub use traits::{BlobStore, RecordStore};
