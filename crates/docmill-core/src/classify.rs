//! Format classification: uploaded bytes + filename/MIME hint → DocumentKind.
//!
//! Resolution order: (a) unambiguous declared MIME type; (b) file extension
//! table; (c) magic bytes; else `UnsupportedFormat`. The declared MIME type
//! is never trusted alone when it is ambiguous — legacy `application/vnd.ms-*`
//! types and `application/octet-stream` cover several extensions, so the
//! extension takes precedence there.

use crate::error::{Error, Result};
use crate::models::DocumentKind;

/// Classify an upload into a document kind, or fail with
/// `UnsupportedFormat`. Pure function of the name, declared type, and
/// header bytes.
pub fn classify(filename: &str, declared_mime: &str, first_bytes: &[u8]) -> Result<DocumentKind> {
    let mime = declared_mime.trim().to_lowercase();

    if !mime_is_ambiguous(&mime) {
        if let Some(kind) = kind_from_mime(&mime) {
            return Ok(kind);
        }
    }

    if let Some(kind) = extension(filename).and_then(|ext| kind_from_extension(&ext)) {
        return Ok(kind);
    }

    if let Some(kind) = kind_from_magic(first_bytes) {
        return Ok(kind);
    }

    Err(Error::UnsupportedFormat(format!(
        "cannot resolve a document kind for '{}' (declared type '{}')",
        filename, declared_mime
    )))
}

/// Lowercased file extension, if any.
fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// MIME types that cover several extensions or carry no format information.
/// For these the extension table decides.
fn mime_is_ambiguous(mime: &str) -> bool {
    mime.is_empty()
        || mime == "application/octet-stream"
        || mime == "application/vnd.ms-office"
        // Legacy ms-* types are reused across doc/xls/ppt containers and
        // template variants; resolve via extension instead.
        || mime.starts_with("application/vnd.ms-excel")
        || mime.starts_with("application/vnd.ms-powerpoint")
        || mime == "application/msword"
}

fn kind_from_mime(mime: &str) -> Option<DocumentKind> {
    // Exact matches first
    let kind = match mime {
        "application/pdf" => Some(DocumentKind::Pdf),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            Some(DocumentKind::Docx)
        }
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
            Some(DocumentKind::Xlsx)
        }
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
            Some(DocumentKind::Pptx)
        }
        "application/rtf" | "text/rtf" => Some(DocumentKind::LegacyOffice),
        "text/csv" | "text/tab-separated-values" | "application/json" | "application/xml"
        | "text/xml" | "application/x-ndjson" | "application/x-dbf" => Some(DocumentKind::Tabular),
        "message/rfc822" | "application/mbox" | "application/vnd.ms-outlook" => {
            Some(DocumentKind::Email)
        }
        "application/epub+zip"
        | "application/x-mobipocket-ebook"
        | "application/x-fictionbook+xml" => Some(DocumentKind::Ebook),
        "text/plain" | "text/markdown" | "text/html" | "application/xhtml+xml" | "text/x-rst"
        | "application/x-tex" | "text/x-tex" => Some(DocumentKind::Markup),
        _ => None,
    };
    if kind.is_some() {
        return kind;
    }

    // Prefix matches
    if mime.starts_with("application/vnd.oasis.opendocument") {
        return Some(DocumentKind::OpenDocument);
    }
    if mime.starts_with("image/") {
        return Some(DocumentKind::Image);
    }
    if mime.starts_with("audio/") {
        return Some(DocumentKind::Audio);
    }
    if mime.starts_with("text/") {
        return Some(DocumentKind::Markup);
    }
    None
}

fn kind_from_extension(ext: &str) -> Option<DocumentKind> {
    match ext {
        "pdf" => Some(DocumentKind::Pdf),
        "docx" => Some(DocumentKind::Docx),
        "xlsx" => Some(DocumentKind::Xlsx),
        "pptx" => Some(DocumentKind::Pptx),
        "doc" | "xls" | "ppt" | "rtf" => Some(DocumentKind::LegacyOffice),
        "odt" | "ods" | "odp" => Some(DocumentKind::OpenDocument),
        "txt" | "md" | "markdown" | "html" | "htm" | "rst" | "tex" | "log" => {
            Some(DocumentKind::Markup)
        }
        "csv" | "tsv" | "json" | "ndjson" | "xml" | "dbf" => Some(DocumentKind::Tabular),
        "png" | "jpg" | "jpeg" | "gif" | "bmp" | "tif" | "tiff" | "webp" => {
            Some(DocumentKind::Image)
        }
        "eml" | "msg" | "mbox" => Some(DocumentKind::Email),
        "epub" | "mobi" | "azw" | "azw3" | "fb2" => Some(DocumentKind::Ebook),
        "mp3" | "wav" | "m4a" | "flac" | "ogg" | "aac" | "wma" => Some(DocumentKind::Audio),
        _ => None,
    }
}

/// Last-resort magic byte detection via `infer`. Only binary kinds have
/// signatures; text formats never resolve here.
fn kind_from_magic(first_bytes: &[u8]) -> Option<DocumentKind> {
    let detected = infer::get(first_bytes)?;
    kind_from_mime(detected.mime_type())
}
