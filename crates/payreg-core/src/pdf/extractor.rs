//! PDF text extraction using lopdf and pdf-extract.

use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use super::{DocumentReader, PdfProcessor, Result};
use crate::error::PdfError;

/// PDF extractor backed by lopdf for structure and pdf-extract for text.
#[derive(Default)]
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a PDF from a file path.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let data = std::fs::read(path)?;
        self.load(&data)
    }

    /// Text of each page, extracted one page at a time.
    ///
    /// Used when whole-document extraction fails, which happens on files
    /// where a single page has a broken font dictionary.
    fn extract_text_by_page(&self) -> Result<String> {
        let doc = self.document.as_ref().ok_or(PdfError::NoPages)?;
        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();

        let mut pages = Vec::with_capacity(page_numbers.len());
        for number in page_numbers {
            match doc.extract_text(&[number]) {
                Ok(text) => pages.push(text),
                Err(e) => debug!("Page {} has no extractable text: {}", number, e),
            }
        }

        if pages.is_empty() {
            return Err(PdfError::TextExtraction(
                "no page yielded text".to_string(),
            ));
        }
        Ok(pages.join("\n"))
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract works on bytes, so keep the decrypted copy
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn page_count(&self) -> u32 {
        self.document
            .as_ref()
            .map(|doc| doc.get_pages().len() as u32)
            .unwrap_or(0)
    }

    fn extract_text(&self) -> Result<String> {
        let text = match pdf_extract::extract_text_from_mem(&self.raw_data) {
            Ok(text) => text,
            Err(e) => {
                warn!("Whole-document text extraction failed ({}), trying page by page", e);
                self.extract_text_by_page()?
            }
        };
        if text.trim().is_empty() {
            warn!(pages = self.page_count(), "No text layer found; the PDF may be a scan");
        }
        Ok(text)
    }
}

impl DocumentReader for PdfExtractor {
    fn read_text(&self, path: &Path) -> Result<String> {
        // Each document gets a fresh extractor; `self` only carries the type
        let mut extractor = PdfExtractor::new();
        extractor.load_file(path)?;
        extractor.extract_text()
    }
}
