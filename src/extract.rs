// src/extract.rs

use std::path::{Path, PathBuf};
use std::process::Command;

use lopdf::Document;
use tracing::{info, warn};

use crate::error::ExtractError;

/// Minimum number of non-whitespace characters we expect from a
/// "real" text PDF. Below this threshold we treat it as scanned.
const MIN_TEXT_CHARS: usize = 30;

/// Turns an image or document into text fragments, in reading order.
pub trait TextExtractor {
    fn extract(&self, path: &Path) -> Result<Vec<String>, ExtractError>;
}

/// Result of attempting to extract text from a PDF.
#[derive(Debug)]
pub enum PdfContent {
    Text(String),
    /// Image-only pages; needs OCR of a photo instead.
    ScannedImage,
    Error(String),
}

/// Split extracted text into trimmed, non-empty fragments.
pub fn fragments(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Classify raw PDF bytes and pull out their text when there is any.
pub fn extract_text_from_pdf(pdf_bytes: &[u8]) -> PdfContent {
    let doc = match Document::load_mem(pdf_bytes) {
        Ok(d) => d,
        Err(e) => return PdfContent::Error(format!("Failed to parse PDF: {e}")),
    };

    if looks_like_scanned(&doc) {
        info!("PDF structural check: likely scanned / image-only");
        return PdfContent::ScannedImage;
    }

    match ::pdf_extract::extract_text_from_mem(pdf_bytes) {
        Ok(text) => {
            let meaningful = text.chars().filter(|c| !c.is_whitespace()).count();
            if meaningful < MIN_TEXT_CHARS {
                info!(chars = meaningful, "Extracted text too short, treating as scanned");
                PdfContent::ScannedImage
            } else {
                info!(chars = meaningful, "Text extracted successfully");
                PdfContent::Text(text)
            }
        }
        Err(e) => {
            warn!(error = %e, "pdf-extract failed; may be scanned or corrupted");
            PdfContent::ScannedImage
        }
    }
}

/// A page with XObject images but no Font resources is almost certainly a
/// scan. The document counts as scanned when at least 80% of pages are.
fn looks_like_scanned(doc: &Document) -> bool {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return false;
    }

    let mut image_only_pages = 0;
    for object_id in pages.values() {
        let Ok(page_obj) = doc.get_object(*object_id) else {
            continue;
        };
        let Ok(page_dict) = page_obj.as_dict() else {
            continue;
        };
        let resources = page_dict
            .get(b"Resources")
            .ok()
            .and_then(|r| doc.dereference(r).ok())
            .and_then(|(_, resolved)| resolved.as_dict().ok());

        let has_entries = |name: &[u8]| {
            resources
                .and_then(|res| res.get(name).ok())
                .and_then(|o| doc.dereference(o).ok())
                .and_then(|(_, resolved)| resolved.as_dict().ok())
                .is_some_and(|d| !d.is_empty())
        };

        if has_entries(b"XObject".as_slice()) && !has_entries(b"Font".as_slice()) {
            image_only_pages += 1;
        }
    }

    let total = pages.len();
    let ratio = image_only_pages as f64 / total as f64;
    info!(
        total_pages = total,
        image_only = image_only_pages,
        ratio = format!("{ratio:.2}"),
        "Scanned-page analysis"
    );
    ratio >= 0.8
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PdfText;

impl TextExtractor for PdfText {
    fn extract(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        let bytes = std::fs::read(path)?;
        match extract_text_from_pdf(&bytes) {
            PdfContent::Text(text) => Ok(fragments(&text)),
            PdfContent::ScannedImage => Err(ExtractError::Scanned(path.to_path_buf())),
            PdfContent::Error(e) => Err(ExtractError::Pdf(e)),
        }
    }
}

/// OCR through an external `tesseract`-compatible command.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    pub command: String,
    pub languages: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, languages: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            languages: languages.into(),
        }
    }
}

impl TextExtractor for TesseractOcr {
    fn extract(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        if !path.exists() {
            return Err(ExtractError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }

        info!(command = %self.command, languages = %self.languages, path = %path.display(), "Running OCR");
        let output = Command::new(&self.command)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .output()
            .map_err(|source| ExtractError::OcrUnavailable {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::OcrFailed(stderr.trim().to_string()));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let lines = fragments(&text);
        info!(fragments = lines.len(), "OCR complete");
        Ok(lines)
    }
}

/// Picks PDF text extraction or OCR from the file extension.
#[derive(Debug, Clone)]
pub struct DocumentText {
    pub pdf: PdfText,
    pub ocr: TesseractOcr,
}

impl DocumentText {
    pub fn new(ocr: TesseractOcr) -> Self {
        Self { pdf: PdfText, ocr }
    }
}

impl TextExtractor for DocumentText {
    fn extract(&self, path: &Path) -> Result<Vec<String>, ExtractError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match ext.as_deref() {
            Some("pdf") => self.pdf.extract(path),
            Some("png" | "jpg" | "jpeg") => self.ocr.extract(path),
            _ => Err(ExtractError::Unsupported(PathBuf::from(path))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_garbage_bytes() {
        let result = extract_text_from_pdf(b"this is not a pdf");
        assert!(matches!(result, PdfContent::Error(_)));
    }

    #[test]
    fn fragments_drop_blank_lines() {
        assert_eq!(fragments("  Solgar \n\n 60 caps\n"), vec!["Solgar", "60 caps"]);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let doc = DocumentText::new(TesseractOcr::new("tesseract", "eng"));
        let err = doc.extract(Path::new("stock.docx")).unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(_)));
    }

    #[test]
    fn missing_image_is_an_io_error() {
        let ocr = TesseractOcr::new("tesseract", "eng");
        let err = ocr.extract(Path::new("/nonexistent/photo.jpg")).unwrap_err();
        assert!(matches!(err, ExtractError::Io(_)));
    }

    #[test]
    fn missing_ocr_binary_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("label.png");
        std::fs::write(&image, b"not really a png").unwrap();

        let ocr = TesseractOcr::new("definitely-not-an-ocr-binary", "eng");
        let err = ocr.extract(&image).unwrap_err();
        assert!(matches!(err, ExtractError::OcrUnavailable { .. }));
    }
}
