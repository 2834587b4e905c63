use crate::error::{PipelineError, RenderError};
use crate::extractor::count_pages;
use crate::models::RenderOptions;
use async_trait::async_trait;
use tempfile::TempDir;
use tokio::process::Command;

/// Rasterizes one page of a PDF into an encoded JPEG.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    async fn rasterize(&self, pdf: &[u8], page_index: u32) -> Result<Vec<u8>, RenderError>;
}

/// Rasterizer backed by poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    pub program: String,
    pub options: RenderOptions,
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new(RenderOptions::default())
    }
}

impl PdftoppmRasterizer {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            program: "pdftoppm".to_string(),
            options,
        }
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, pdf: &[u8], page_index: u32) -> Result<Vec<u8>, RenderError> {
        // Removed on drop, on every return path.
        let workdir = TempDir::new()?;
        let input = workdir.path().join("input.pdf");
        let output_prefix = workdir.path().join("page");
        tokio::fs::write(&input, pdf).await?;

        let page_number = (page_index + 1).to_string();
        let output = Command::new(&self.program)
            .arg("-jpeg")
            .arg("-jpegopt")
            .arg(format!("quality={}", self.options.jpeg_quality))
            .arg("-r")
            .arg(self.options.dpi.to_string())
            .arg("-f")
            .arg(&page_number)
            .arg("-l")
            .arg(&page_number)
            .arg("-singlefile")
            .arg(&input)
            .arg(&output_prefix)
            .output()
            .await
            .map_err(|error| {
                RenderError::Rasterizer(format!("failed to run {}: {error}", self.program))
            })?;

        if !output.status.success() {
            return Err(RenderError::Rasterizer(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let image = tokio::fs::read(output_prefix.with_extension("jpg")).await?;
        if image.is_empty() {
            return Err(RenderError::Rasterizer(format!(
                "{} produced an empty image",
                self.program
            )));
        }
        Ok(image)
    }
}

/// Converts a 1-based page number to a 0-based index within `page_count`.
pub fn page_index(page_number: i64, page_count: u32) -> Result<u32, PipelineError> {
    if page_number < 1 {
        return Err(PipelineError::Validation(format!(
            "page number must be at least 1, got {page_number}"
        )));
    }
    if page_number > i64::from(page_count) {
        return Err(PipelineError::Validation(format!(
            "page {page_number} is out of range, the document has {page_count} page(s)"
        )));
    }
    Ok((page_number - 1) as u32)
}

pub async fn render_page(
    rasterizer: &dyn PageRasterizer,
    pdf: &[u8],
    page_number: i64,
) -> Result<Vec<u8>, PipelineError> {
    let page_count = count_pages(pdf)?;
    let index = page_index(page_number, page_count)?;
    Ok(rasterizer.rasterize(pdf, index).await?)
}
