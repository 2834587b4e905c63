use crate::error::ExtractError;
use crate::models::ExtractedPdf;
use lopdf::Document;
use std::path::Path;

pub trait PdfExtractor: Send + Sync {
    fn extract(&self, pdf: &[u8]) -> Result<ExtractedPdf, ExtractError>;

    fn extract_path(&self, path: &Path) -> Result<ExtractedPdf, ExtractError> {
        let bytes = std::fs::read(path)?;
        self.extract(&bytes)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract(&self, pdf: &[u8]) -> Result<ExtractedPdf, ExtractError> {
        let document =
            Document::load_mem(pdf).map_err(|error| ExtractError::PdfParse(error.to_string()))?;

        let pages = document.get_pages();
        let mut page_texts = Vec::with_capacity(pages.len());
        for page_no in pages.keys() {
            let text = document
                .extract_text(&[*page_no])
                .map_err(|error| ExtractError::PdfParse(format!("page {page_no}: {error}")))?;
            page_texts.push(text);
        }

        Ok(ExtractedPdf {
            page_count: pages.len() as u32,
            text: page_texts.join("\n"),
        })
    }
}

/// Page count without text extraction.
pub fn count_pages(pdf: &[u8]) -> Result<u32, ExtractError> {
    let document =
        Document::load_mem(pdf).map_err(|error| ExtractError::PdfParse(error.to_string()))?;
    Ok(document.get_pages().len() as u32)
}

#[cfg(test)]
mod tests {
    use super::{count_pages, LopdfExtractor, PdfExtractor};
    use crate::error::ExtractError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let result = LopdfExtractor.extract(b"%PDF-1.4\n%broken");
        assert!(matches!(result, Err(ExtractError::PdfParse(_))));
        assert!(count_pages(b"not a pdf").is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let result = LopdfExtractor.extract_path(&dir.path().join("absent.pdf"));
        assert!(matches!(result, Err(ExtractError::Io(_))));
        Ok(())
    }

    #[test]
    fn unreadable_file_on_disk_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("unreadable.pdf");
        fs::write(&path, b"%PDF-1.4\n%fake")?;

        assert!(LopdfExtractor.extract_path(&path).is_err());
        Ok(())
    }
}
