use crate::error::IngestError;
use crate::models::Page;
use lopdf::Document;
use std::path::Path;
use tracing::{debug, warn};

pub trait PdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<Page>, IngestError>;
}

/// Text-layer extraction with `lopdf`. Page numbers start at 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl PdfExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<Page>, IngestError> {
        if !path.is_file() {
            return Err(IngestError::NotFound(path.to_path_buf()));
        }

        let document =
            Document::load(path).map_err(|error| IngestError::CorruptDocument(error.to_string()))?;

        let mut pages = Vec::new();
        for (page_number, _page_id) in document.get_pages() {
            let text = match document.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(error) => {
                    warn!(
                        path = %path.display(),
                        page = page_number,
                        %error,
                        "skipping page without a readable text layer"
                    );
                    continue;
                }
            };

            if !text.trim().is_empty() {
                pages.push(Page {
                    page_no: page_number.saturating_sub(1),
                    text,
                });
            }
        }

        debug!(path = %path.display(), pages = pages.len(), "extracted pdf text");
        Ok(pages)
    }
}

pub fn extract_pages(path: &Path) -> Result<Vec<Page>, IngestError> {
    LopdfExtractor.extract_pages(path)
}
