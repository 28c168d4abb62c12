//! Legacy-format conversion — formats that need an intermediate rendering
//! step before text extraction.
//!
//! `pandoc` handles the formats it can read directly (rtf, odt, epub,
//! pptx is not among them); everything else goes through
//! `soffice --headless --convert-to`, producing plain text (or CSV for
//! spreadsheets, which is then parsed into a table).

use async_trait::async_trait;
use serde_json::json;
use tokio::process::Command;
use tracing::debug;

use docmill_core::defaults::EXTRACTION_CMD_TIMEOUT_SECS;
use docmill_core::{
    DocumentKind, Element, Error, ExtractOptions, Extractor, ExtractorFamily, RawDocument,
    RawPage, Result,
};

use super::{run_cmd_status, run_cmd_with_timeout, text_to_elements, write_temp_file};
use crate::extract::structured_data::StructuredDataExtractor;

/// Extractor for legacy Office, OpenDocument, OOXML spreadsheets and
/// presentations, and ebooks.
pub struct LegacyConvertExtractor;

/// Pandoc input format for extensions pandoc reads natively.
fn pandoc_input_format(filename: &str) -> Option<&'static str> {
    let ext = filename.rsplit_once('.')?.1.to_lowercase();
    match ext.as_str() {
        "rtf" => Some("rtf"),
        "odt" => Some("odt"),
        "epub" => Some("epub"),
        "fb2" => Some("fb2"),
        _ => None,
    }
}

/// Whether the kind renders to CSV (spreadsheets) rather than plain text.
fn renders_to_csv(kind: DocumentKind, filename: &str) -> bool {
    match kind {
        DocumentKind::Xlsx => true,
        DocumentKind::LegacyOffice => filename.to_lowercase().ends_with(".xls"),
        _ => false,
    }
}

impl LegacyConvertExtractor {
    async fn convert_with_pandoc(
        &self,
        data: &[u8],
        filename: &str,
        format: &'static str,
    ) -> Result<RawDocument> {
        let tmpfile = write_temp_file(data, filename)?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();

        debug!(filename, format, "Converting with pandoc");
        let text = run_cmd_with_timeout(
            Command::new("pandoc")
                .arg("-f")
                .arg(format)
                .arg("-t")
                .arg("plain")
                .arg("--wrap=none")
                .arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS,
        )
        .await?;

        Ok(RawDocument {
            pages: vec![RawPage::from_elements(text_to_elements(&text))],
            metadata: json!({
                "converter": "pandoc",
                "format": format,
                "char_count": text.len(),
            }),
        })
    }

    /// Render through LibreOffice headless into `txt` or `csv`, then parse
    /// the intermediate output.
    async fn convert_with_soffice(
        &self,
        data: &[u8],
        filename: &str,
        to_csv: bool,
    ) -> Result<RawDocument> {
        let tmpfile = write_temp_file(data, filename)?;
        let tmp_path = tmpfile.path().to_string_lossy().to_string();
        let out_dir = tempfile::TempDir::new()
            .map_err(|e| Error::Internal(format!("failed to create temp dir: {}", e)))?;

        let target = if to_csv { "csv" } else { "txt" };
        debug!(filename, target, "Converting with soffice");
        run_cmd_status(
            Command::new("soffice")
                .arg("--headless")
                .arg("--convert-to")
                .arg(target)
                .arg("--outdir")
                .arg(out_dir.path())
                .arg(&tmp_path),
            EXTRACTION_CMD_TIMEOUT_SECS * 2,
        )
        .await?;

        // soffice writes <stem>.<target> into the out dir.
        let converted = std::fs::read_dir(out_dir.path())
            .map_err(|e| Error::Internal(format!("failed to read out dir: {}", e)))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .find(|p| p.extension().and_then(|e| e.to_str()) == Some(target))
            .ok_or_else(|| {
                Error::ExtractionFailed("converter produced no output file".to_string())
            })?;

        let bytes = std::fs::read(&converted)
            .map_err(|e| Error::ExtractionFailed(format!("failed to read converter output: {}", e)))?;
        let text = String::from_utf8_lossy(&bytes).into_owned();

        let elements: Vec<Element> = if to_csv {
            let (rows, _) = StructuredDataExtractor::parse_csv_rows(&text);
            if rows.is_empty() {
                Vec::new()
            } else {
                vec![Element::table(rows)]
            }
        } else {
            text_to_elements(&text)
        };

        Ok(RawDocument {
            pages: vec![RawPage::from_elements(elements)],
            metadata: json!({
                "converter": "soffice",
                "intermediate": target,
                "char_count": text.len(),
            }),
        })
    }
}

#[async_trait]
impl Extractor for LegacyConvertExtractor {
    fn family(&self) -> ExtractorFamily {
        ExtractorFamily::LegacyConvert
    }

    async fn extract(
        &self,
        kind: DocumentKind,
        data: &[u8],
        filename: &str,
        _options: &ExtractOptions,
    ) -> Result<RawDocument> {
        if data.is_empty() {
            return Err(Error::ExtractionFailed(
                "cannot convert an empty document".to_string(),
            ));
        }

        if let Some(format) = pandoc_input_format(filename) {
            return self.convert_with_pandoc(data, filename, format).await;
        }

        let to_csv = renders_to_csv(kind, filename);
        self.convert_with_soffice(data, filename, to_csv).await
    }

    fn supports_tables(&self) -> bool {
        true
    }

    async fn health_check(&self) -> Result<bool> {
        let pandoc = match Command::new("pandoc").arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        };
        let soffice = match Command::new("soffice").arg("--version").output().await {
            Ok(output) => output.status.success(),
            Err(_) => false,
        };
        Ok(pandoc || soffice)
    }

    fn name(&self) -> &str {
        "legacy_convert"
    }
}
