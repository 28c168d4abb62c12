//! Native-text extraction — documents with an embedded text layer.
//!
//! Covers PDFs (`pdftotext`, poppler-utils), modern Word documents
//! (`pandoc -f docx`), markup/plain text (decoded directly), and email
//! messages (RFC 822 header + body split). Scanned PDF pages with no
//! usable text layer fall through to the OCR engine when `ocr_enabled`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tokio::process::Command;
use tracing::{debug, warn};

use docmill_core::defaults::{EXTRACTION_CMD_TIMEOUT_SECS, PDF_TEXT_LAYER_MIN_CHARS};
use docmill_core::{
    DocumentKind, Element, Error, ExtractOptions, Extractor, ExtractorFamily, RawDocument,
    RawPage, Result,
};

use super::{run_cmd_status, run_cmd_with_timeout, text_to_elements, write_temp_file};
use crate::extract::OcrEngine;

/// Extractor for documents whose bytes already carry text.
pub struct NativeTextExtractor {
    /// OCR engine for scanned PDF pages. Optional: without it, image-only
    /// pages yield zero text when OCR is requested but report
    /// `ExtractorUnavailable`.
    ocr: Option<Arc<OcrEngine>>,
}

impl NativeTextExtractor {
    pub fn new(ocr: Option<Arc<OcrEngine>>) -> Self {
        Self { ocr }
    }

    /// Parse `pdfinfo` output into a JSON metadata object.
    fn parse_pdfinfo(output: &str) -> JsonValue {
        let mut metadata = serde_json::Map::new();

        for line in output.lines() {
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim().to_lowercase().replace(' ', "_");
                let value = value.trim();
                if !value.is_empty() {
                    if key == "pages" {
                        if let Ok(pages) = value.parse::<u64>() {
                            metadata.insert(key, JsonValue::Number(pages.into()));
                            continue;
                        }
                    }
                    metadata.insert(key, JsonValue::String(value.to_string()));
                }
            }
        }

        JsonValue::Object(metadata)
    }

    async fn extract_pdf(
        &self,
        data: &[u8],
        filename: &str,
        options: &ExtractOptions,
    ) -> Result<RawDocument> {
        if data.len() < 4 || &data[0..4] != b"%PDF" {
            return Err(Error::ExtractionFailed(format!(
                "file '{}' is not a valid PDF (missing %PDF header)",
                filename
            )));
        }

        let tmpfile = write_temp_file(data, filename)?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        // Metadata from pdfinfo; extraction continues without it on failure.
        let metadata = match run_cmd_with_timeout(
            Command::new("pdfinfo").arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await
        {
            Ok(output) => Self::parse_pdfinfo(&output),
            Err(e) => {
                warn!(filename, error = %e, "pdfinfo failed, continuing without metadata");
                json!({})
            }
        };

        // pdftotext emits form-feed separated pages.
        let text = run_cmd_with_timeout(
            Command::new("pdftotext").arg(&tmp_path).arg("-"),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        // pdftotext emits one form feed per page, including after the last;
        // drop the trailing empty segment.
        let mut segments: Vec<&str> = text.split('\u{c}').collect();
        if segments.len() > 1 && segments.last().is_some_and(|s| s.is_empty()) {
            segments.pop();
        }

        let mut pages = Vec::new();
        let mut ocr_pages = 0usize;
        for (idx, page_text) in segments.into_iter().enumerate() {
            if page_text.trim().len() < PDF_TEXT_LAYER_MIN_CHARS {
                // Image-only page: OCR it when enabled, otherwise it
                // yields zero text.
                if options.ocr_enabled {
                    match self.ocr_pdf_page(&tmp_path, idx + 1).await {
                        Ok(ocr_text) => {
                            ocr_pages += 1;
                            pages.push(RawPage::from_elements(text_to_elements(&ocr_text)));
                            continue;
                        }
                        Err(Error::ExtractorUnavailable(msg)) => {
                            return Err(Error::ExtractorUnavailable(msg));
                        }
                        Err(e) => {
                            warn!(filename, page = idx + 1, error = %e, "page OCR failed");
                        }
                    }
                }
                pages.push(RawPage::default());
            } else {
                pages.push(RawPage::from_elements(text_to_elements(page_text)));
            }
        }

        if pages.is_empty() {
            pages.push(RawPage::default());
        }

        let mut metadata = metadata;
        if let Some(obj) = metadata.as_object_mut() {
            obj.insert("ocr_pages".to_string(), JsonValue::Number(ocr_pages.into()));
        }

        Ok(RawDocument { pages, metadata })
    }

    /// Render one PDF page to PNG (`pdftoppm`) and OCR it.
    async fn ocr_pdf_page(&self, pdf_path: &str, page: usize) -> Result<String> {
        let engine = self.ocr.as_ref().ok_or_else(|| {
            Error::ExtractorUnavailable("OCR requested but no engine configured".to_string())
        })?;
        if !engine.available().await {
            return Err(Error::ExtractorUnavailable(
                "OCR engine is not installed".to_string(),
            ));
        }

        let img_dir = tempfile::TempDir::new()
            .map_err(|e| Error::Internal(format!("failed to create temp dir: {}", e)))?;
        let img_prefix = img_dir.path().join("page").to_string_lossy().to_string();

        run_cmd_status(
            Command::new("pdftoppm")
                .arg("-png")
                .arg("-f")
                .arg(page.to_string())
                .arg("-l")
                .arg(page.to_string())
                .arg(pdf_path)
                .arg(&img_prefix),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        // pdftoppm names output page-N.png; find whatever it produced.
        let mut rendered: Vec<_> = std::fs::read_dir(img_dir.path())
            .map_err(|e| Error::Internal(format!("failed to read temp dir: {}", e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("png"))
            .collect();
        rendered.sort();

        let img_path = rendered.first().ok_or_else(|| {
            Error::ExtractionFailed(format!("no image rendered for page {}", page))
        })?;

        engine.recognize_file(&img_path.to_string_lossy()).await
    }

    async fn extract_docx(&self, data: &[u8], filename: &str) -> Result<RawDocument> {
        let tmpfile = write_temp_file(data, filename)?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        debug!(filename, "Converting docx with pandoc");
        let text = run_cmd_with_timeout(
            Command::new("pandoc")
                .arg("-f")
                .arg("docx")
                .arg("-t")
                .arg("plain")
                .arg("--wrap=none")
                .arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        Ok(RawDocument {
            pages: vec![RawPage::from_elements(text_to_elements(&text))],
            metadata: json!({ "converter": "pandoc", "char_count": text.len() }),
        })
    }

    fn extract_markup(&self, data: &[u8]) -> RawDocument {
        let text = String::from_utf8_lossy(data).into_owned();
        RawDocument {
            pages: vec![RawPage::from_elements(text_to_elements(&text))],
            metadata: json!({
                "char_count": text.len(),
                "line_count": text.lines().count(),
            }),
        }
    }

    fn extract_email(&self, data: &[u8]) -> RawDocument {
        let text = String::from_utf8_lossy(data);
        let (headers, body) = match text.split_once("\n\n") {
            Some((h, b)) => (h, b),
            None => (text.as_ref(), ""),
        };

        let mut elements = Vec::new();
        let mut header_lines = Vec::new();
        let mut subject = None;
        for line in headers.lines() {
            if let Some(value) = line.strip_prefix("Subject:") {
                subject = Some(value.trim().to_string());
            } else if line.starts_with("From:") || line.starts_with("To:")
                || line.starts_with("Date:") || line.starts_with("Cc:")
            {
                header_lines.push(line.trim().to_string());
            }
        }

        if let Some(subject) = &subject {
            elements.push(Element::heading(1, subject.clone()));
        }
        if !header_lines.is_empty() {
            elements.push(Element::paragraph(header_lines.join("\n")));
        }
        elements.extend(text_to_elements(body));

        RawDocument {
            pages: vec![RawPage::from_elements(elements)],
            metadata: json!({ "subject": subject }),
        }
    }
}

#[async_trait]
impl Extractor for NativeTextExtractor {
    fn family(&self) -> ExtractorFamily {
        ExtractorFamily::NativeText
    }

    async fn extract(
        &self,
        kind: DocumentKind,
        data: &[u8],
        filename: &str,
        options: &ExtractOptions,
    ) -> Result<RawDocument> {
        if data.is_empty() {
            return Err(Error::ExtractionFailed(
                "cannot extract text from an empty document".to_string(),
            ));
        }

        match kind {
            DocumentKind::Pdf => self.extract_pdf(data, filename, options).await,
            DocumentKind::Docx => self.extract_docx(data, filename).await,
            DocumentKind::Markup => Ok(self.extract_markup(data)),
            DocumentKind::Email => Ok(self.extract_email(data)),
            other => Err(Error::Internal(format!(
                "native-text extractor dispatched for kind '{}'",
                other
            ))),
        }
    }

    fn supports_ocr(&self) -> bool {
        self.ocr.is_some()
    }

    async fn health_check(&self) -> Result<bool> {
        // Markup extraction has no external dependencies; report the
        // pdftotext availability since PDFs are the dominant input.
        match Command::new("pdftotext").arg("-v").output().await {
            Ok(output) => {
                // pdftotext -v prints version to stderr; exit code varies
                // by version.
                Ok(output.status.success() || output.status.code() == Some(99))
            }
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "native_text"
    }
}
