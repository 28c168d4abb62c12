//! OCR extraction — images (and scanned PDF pages) through `tesseract`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tracing::debug;

use docmill_core::defaults::{DEFAULT_OCR_COMMAND, ENV_OCR_COMMAND, EXTRACTION_CMD_TIMEOUT_SECS};
use docmill_core::{
    DocumentKind, ExtractOptions, Extractor, ExtractorFamily, RawDocument, RawPage, Result,
};

use super::{run_cmd_with_timeout, text_to_elements, write_temp_file};

/// Opaque OCR backend: shells out to `tesseract` (overridable via
/// `OCR_COMMAND`). Shared between the image extractor and the native-text
/// extractor's scanned-PDF fallback.
pub struct OcrEngine {
    command: String,
}

impl OcrEngine {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Create from environment, defaulting to `tesseract`.
    pub fn from_env() -> Self {
        let command =
            std::env::var(ENV_OCR_COMMAND).unwrap_or_else(|_| DEFAULT_OCR_COMMAND.to_string());
        Self::new(command)
    }

    /// Recognize text in an image file already on disk.
    pub async fn recognize_file(&self, path: &str) -> Result<String> {
        run_cmd_with_timeout(
            Command::new(&self.command).arg(path).arg("stdout"),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await
    }

    /// Recognize text in raw image bytes.
    pub async fn recognize(&self, data: &[u8], filename: &str) -> Result<String> {
        let tmpfile = write_temp_file(data, filename)?;
        let path = tmpfile.path().to_string_lossy().to_string();
        self.recognize_file(&path).await
    }

    /// Check that the OCR binary is present.
    pub async fn available(&self) -> bool {
        match Command::new(&self.command).arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        }
    }
}

impl Default for OcrEngine {
    fn default() -> Self {
        Self::new(DEFAULT_OCR_COMMAND)
    }
}

/// Extractor for raster images.
///
/// With `ocr_enabled=false` an image yields one page with zero text rather
/// than an error; with OCR enabled but the engine absent, extraction fails
/// with `ExtractorUnavailable`.
pub struct OcrExtractor {
    engine: Arc<OcrEngine>,
}

impl OcrExtractor {
    pub fn new(engine: Arc<OcrEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Extractor for OcrExtractor {
    fn family(&self) -> ExtractorFamily {
        ExtractorFamily::Ocr
    }

    async fn extract(
        &self,
        _kind: DocumentKind,
        data: &[u8],
        filename: &str,
        options: &ExtractOptions,
    ) -> Result<RawDocument> {
        if data.is_empty() {
            return Err(docmill_core::Error::ExtractionFailed(
                "cannot OCR empty image data".to_string(),
            ));
        }

        if !options.ocr_enabled {
            // Image-only content with OCR disabled: an empty page, not an
            // error.
            return Ok(RawDocument {
                pages: vec![RawPage {
                    elements: Vec::new(),
                    image_refs: vec![filename.to_string()],
                }],
                metadata: json!({ "ocr": "disabled" }),
            });
        }

        if !self.engine.available().await {
            return Err(docmill_core::Error::ExtractorUnavailable(
                "OCR engine is not installed".to_string(),
            ));
        }

        debug!(filename, "Running OCR");
        let text = self.engine.recognize(data, filename).await?;

        let elements = text_to_elements(&text);
        Ok(RawDocument {
            pages: vec![RawPage {
                elements,
                image_refs: vec![filename.to_string()],
            }],
            metadata: json!({
                "ocr": "tesseract",
                "char_count": text.len(),
            }),
        })
    }

    fn supports_ocr(&self) -> bool {
        true
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.engine.available().await)
    }

    fn name(&self) -> &str {
        "ocr"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmill_core::ExtractOptions;

    fn extractor() -> OcrExtractor {
        OcrExtractor::new(Arc::new(OcrEngine::from_env()))
    }

    #[test]
    fn test_ocr_family() {
        assert_eq!(extractor().family(), ExtractorFamily::Ocr);
        assert_eq!(extractor().name(), "ocr");
        assert!(extractor().supports_ocr());
    }

    #[tokio::test]
    async fn test_ocr_health_check_does_not_error() {
        // Passes whether or not tesseract is installed
        assert!(extractor().health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_ocr_disabled_yields_empty_page() {
        let options = ExtractOptions {
            ocr_enabled: false,
            extract_tables: true,
        };
        let raw = extractor()
            .extract(DocumentKind::Image, b"\x89PNG....", "scan.png", &options)
            .await
            .unwrap();
        assert_eq!(raw.pages.len(), 1);
        assert!(raw.pages[0].elements.is_empty());
        assert_eq!(raw.pages[0].image_refs, vec!["scan.png".to_string()]);
    }

    #[tokio::test]
    async fn test_ocr_empty_input_fails() {
        let result = extractor()
            .extract(
                DocumentKind::Image,
                b"",
                "empty.png",
                &ExtractOptions::default(),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_ocr_missing_engine_is_unavailable() {
        let engine = Arc::new(OcrEngine::new("definitely-not-a-real-ocr-binary"));
        let extractor = OcrExtractor::new(engine);
        let err = extractor
            .extract(
                DocumentKind::Image,
                b"\x89PNG....",
                "scan.png",
                &ExtractOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "EXTRACTOR_UNAVAILABLE");
    }
}
