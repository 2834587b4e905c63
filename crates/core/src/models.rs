use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::segmenter::SegmentationPolicy;

pub const DEFAULT_BUCKET: &str = "pdf";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentRecord {
    pub id: i64,
    pub name: String,
    pub num_pages: u32,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sentence {
    pub id: i64,
    pub text: String,
    pub document_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPdf {
    pub page_count: u32,
    pub text: String,
}

/// Sentences of one document that contain the searched keyword, numbered
/// from 1 in the order they were stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMatches {
    pub document_id: i64,
    pub sentences: BTreeMap<usize, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordSearch {
    Matches(Vec<DocumentMatches>),
    NotFound,
}

impl KeywordSearch {
    pub const NOT_FOUND_MARKER: &'static str = "Not found";

    pub fn matches(&self) -> &[DocumentMatches] {
        match self {
            Self::Matches(matches) => matches,
            Self::NotFound => &[],
        }
    }

    pub fn for_document(&self, document_id: i64) -> Option<&DocumentMatches> {
        self.matches()
            .iter()
            .find(|entry| entry.document_id == document_id)
    }
}

impl Serialize for KeywordSearch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::NotFound => serializer.serialize_str(Self::NOT_FOUND_MARKER),
            Self::Matches(documents) => {
                let mut map = serializer.serialize_map(Some(documents.len()))?;
                for document in documents {
                    let numbered: BTreeMap<String, &String> = document
                        .sentences
                        .iter()
                        .map(|(number, text)| (number.to_string(), text))
                        .collect();
                    map.serialize_entry(&format!("PDF ID {}", document.document_id), &numbered)?;
                }
                map.end()
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct OccurrenceReport {
    pub count: usize,
    pub found_in: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RankedWord {
    pub word: String,
    pub frequency: usize,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub bucket: String,
    pub segmentation: SegmentationPolicy,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            segmentation: SegmentationPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub dpi: u32,
    pub jpeg_quality: u8,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            dpi: 150,
            jpeg_quality: 75,
        }
    }
}
