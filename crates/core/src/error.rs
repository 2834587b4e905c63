use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("extraction task failed: {0}")]
    Task(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rasterizer failed: {0}")]
    Rasterizer(String),
}

/// Failure kinds surfaced by the document pipeline.
///
/// Only [`PipelineError::Validation`] is a client error; every other kind is
/// reported as a server-side failure with a human-readable cause.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("failed to read pdf as text: {0}")]
    Extraction(#[from] ExtractError),

    #[error("{context}: {source}")]
    Storage {
        context: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to remove the pdf from the blob store: {0}")]
    BlobDelete(#[source] StoreError),

    #[error("failed to remove the document record (blob restored: {restored}): {source}")]
    RecordDelete {
        #[source]
        source: StoreError,
        restored: bool,
    },

    #[error("a document with id {0} does not exist")]
    NotFound(i64),

    #[error("failed to render page: {0}")]
    Render(#[from] RenderError),
}

impl PipelineError {
    pub fn storage(context: impl Into<String>, source: StoreError) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    /// Maps a store failure for a record lookup, turning `NotFound` into the
    /// pipeline's own not-found kind.
    pub fn from_lookup(document_id: i64, context: impl Into<String>, source: StoreError) -> Self {
        match source {
            StoreError::NotFound(_) => Self::NotFound(document_id),
            other => Self::storage(context, other),
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_validation_is_a_client_error() {
        assert!(PipelineError::Validation("page must be positive".to_string()).is_client_error());
        assert!(!PipelineError::NotFound(3).is_client_error());
        assert!(!PipelineError::Render(RenderError::Rasterizer("boom".to_string())).is_client_error());
    }

    #[test]
    fn lookup_not_found_maps_to_pipeline_not_found() {
        let error = PipelineError::from_lookup(
            42,
            "failed to load record",
            StoreError::NotFound("record 42".to_string()),
        );
        assert!(matches!(error, PipelineError::NotFound(42)));

        let error = PipelineError::from_lookup(
            42,
            "failed to load record",
            StoreError::Request("connection reset".to_string()),
        );
        assert_eq!(
            error.to_string(),
            "failed to load record: store request failed: connection reset"
        );
    }
}
