//! Extractor implementations, one per technology family, plus shared
//! helpers for external converter tools.

pub mod legacy_convert;
pub mod native_text;
pub mod ocr;
pub mod structured_data;
pub mod transcribe;

pub use legacy_convert::LegacyConvertExtractor;
pub use native_text::NativeTextExtractor;
pub use ocr::{OcrEngine, OcrExtractor};
pub use structured_data::StructuredDataExtractor;
pub use transcribe::{TranscribeExtractor, WhisperHttpBackend};

use std::io::Write;

use tokio::process::Command;

use docmill_core::{Element, Error, Result};

/// Run a command with a timeout, returning stdout as a string.
pub(crate) async fn run_cmd_with_timeout(cmd: &mut Command, timeout_secs: u64) -> Result<String> {
    let output = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::ExtractionFailed(format!(
                "external command timed out after {}s",
                timeout_secs
            ))
        })?
        .map_err(|e| Error::ExtractionFailed(format!("failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ExtractionFailed(format!(
            "command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a command that writes its output to files rather than stdout.
pub(crate) async fn run_cmd_status(cmd: &mut Command, timeout_secs: u64) -> Result<()> {
    let output = tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), cmd.output())
        .await
        .map_err(|_| {
            Error::ExtractionFailed(format!(
                "external command timed out after {}s",
                timeout_secs
            ))
        })?
        .map_err(|e| Error::ExtractionFailed(format!("failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ExtractionFailed(format!(
            "command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(())
}

/// Write bytes to a named temp file, preserving the filename's extension so
/// converters that dispatch on suffix behave correctly.
pub(crate) fn write_temp_file(data: &[u8], filename: &str) -> Result<tempfile::NamedTempFile> {
    let suffix = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 8)
        .map(|ext| format!(".{}", ext))
        .unwrap_or_default();
    let mut tmpfile = tempfile::Builder::new()
        .suffix(&suffix)
        .tempfile()
        .map_err(|e| Error::Internal(format!("failed to create temp file: {}", e)))?;
    tmpfile
        .write_all(data)
        .map_err(|e| Error::Internal(format!("failed to write temp file: {}", e)))?;
    Ok(tmpfile)
}

/// Parse flat text into typed elements: blank-line separated blocks become
/// paragraphs, markdown-style `#` prefixes become headings.
///
/// Used for markup input, pdftotext output, and converter plain-text
/// output. Deterministic: the same text always yields the same elements.
pub(crate) fn text_to_elements(text: &str) -> Vec<Element> {
    let mut elements = Vec::new();

    for block in text.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }

        // A heading line may be glued to its following paragraph when the
        // source uses single newlines; split the first line off if it is a
        // heading marker.
        let mut rest = block;
        while let Some((first, tail)) = rest.split_once('\n') {
            if let Some(heading) = parse_heading(first) {
                elements.push(heading);
                rest = tail.trim_start_matches('\n');
            } else {
                break;
            }
        }
        if rest.is_empty() {
            continue;
        }
        if let Some(heading) = parse_heading(rest) {
            elements.push(heading);
        } else {
            elements.push(Element::paragraph(rest));
        }
    }

    elements
}

/// Parse a single line as a markdown ATX heading (`#` through `######`).
fn parse_heading(line: &str) -> Option<Element> {
    let trimmed = line.trim();
    if trimmed.contains('\n') {
        return None;
    }
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &trimmed[hashes..];
    if !rest.starts_with(' ') {
        return None;
    }
    let title = rest.trim();
    if title.is_empty() {
        return None;
    }
    Some(Element::heading(hashes as u8, title))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmill_core::ElementKind;

    #[test]
    fn test_text_to_elements_paragraphs() {
        let elements = text_to_elements("First paragraph.\n\nSecond paragraph.");
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].kind, ElementKind::Paragraph);
        assert_eq!(elements[0].text, "First paragraph.");
        assert_eq!(elements[1].text, "Second paragraph.");
    }

    #[test]
    fn test_text_to_elements_headings() {
        let elements = text_to_elements("# Title\n\nBody text.\n\n## Section\n\nMore.");
        assert_eq!(elements.len(), 4);
        assert_eq!(elements[0].kind, ElementKind::Heading { level: 1 });
        assert_eq!(elements[0].text, "Title");
        assert_eq!(elements[2].kind, ElementKind::Heading { level: 2 });
    }

    #[test]
    fn test_text_to_elements_heading_glued_to_paragraph() {
        let elements = text_to_elements("# Title\nBody right below.");
        assert_eq!(elements.len(), 2);
        assert!(elements[0].is_heading());
        assert_eq!(elements[1].text, "Body right below.");
    }

    #[test]
    fn test_text_to_elements_empty() {
        assert!(text_to_elements("").is_empty());
        assert!(text_to_elements("\n\n\n").is_empty());
    }

    #[test]
    fn test_text_to_elements_is_deterministic() {
        let text = "# A\n\npara one\n\n## B\n\npara two";
        assert_eq!(text_to_elements(text), text_to_elements(text));
    }

    #[test]
    fn test_parse_heading_rules() {
        assert!(parse_heading("# ok").is_some());
        assert!(parse_heading("###### six").is_some());
        assert!(parse_heading("####### seven").is_none());
        assert!(parse_heading("#nospace").is_none());
        assert!(parse_heading("plain").is_none());
        assert!(parse_heading("# ").is_none());
    }

    #[test]
    fn test_write_temp_file_preserves_extension() {
        let tmp = write_temp_file(b"data", "report.pdf").unwrap();
        assert!(tmp.path().to_string_lossy().ends_with(".pdf"));
    }

    #[test]
    fn test_write_temp_file_no_extension() {
        let tmp = write_temp_file(b"data", "README").unwrap();
        assert!(tmp.path().exists());
    }
}
