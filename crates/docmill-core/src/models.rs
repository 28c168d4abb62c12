//! Core data model for the conversion pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// DOCUMENT KINDS
// =============================================================================

/// Closed set of supported document kinds, derived once per request by the
/// format classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    /// PDF documents (text layer, possibly scanned pages)
    Pdf,
    /// Modern Word documents (OOXML)
    Docx,
    /// Modern Excel workbooks (OOXML)
    Xlsx,
    /// Modern PowerPoint presentations (OOXML)
    Pptx,
    /// Legacy binary Office formats (doc, xls, ppt, rtf)
    LegacyOffice,
    /// OpenDocument formats (odt, ods, odp)
    OpenDocument,
    /// Plain text and markup (txt, md, html, rst, tex)
    Markup,
    /// Structured/tabular data (csv, tsv, json, xml, dbf)
    Tabular,
    /// Raster images (png, jpg, tiff, ...)
    Image,
    /// Email messages (eml, msg, mbox)
    Email,
    /// Ebooks (epub, mobi, fb2)
    Ebook,
    /// Audio recordings (mp3, wav, m4a, ...)
    Audio,
}

impl DocumentKind {
    /// The extractor technology family responsible for this kind.
    ///
    /// Dispatch is by kind only; this mapping is the single routing table.
    pub fn family(&self) -> ExtractorFamily {
        match self {
            DocumentKind::Pdf | DocumentKind::Docx | DocumentKind::Markup | DocumentKind::Email => {
                ExtractorFamily::NativeText
            }
            DocumentKind::Xlsx
            | DocumentKind::Pptx
            | DocumentKind::LegacyOffice
            | DocumentKind::OpenDocument
            | DocumentKind::Ebook => ExtractorFamily::LegacyConvert,
            DocumentKind::Tabular => ExtractorFamily::StructuredData,
            DocumentKind::Image => ExtractorFamily::Ocr,
            DocumentKind::Audio => ExtractorFamily::Transcription,
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Pptx => "pptx",
            Self::LegacyOffice => "legacy_office",
            Self::OpenDocument => "open_document",
            Self::Markup => "markup",
            Self::Tabular => "tabular",
            Self::Image => "image",
            Self::Email => "email",
            Self::Ebook => "ebook",
            Self::Audio => "audio",
        };
        write!(f, "{}", s)
    }
}

/// Extractor technology family. One registered extractor per family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorFamily {
    /// Direct text extraction (PDF text layer, markup, modern Word, email)
    NativeText,
    /// Optical character recognition (images, scanned PDF pages)
    Ocr,
    /// Audio transcription
    Transcription,
    /// Intermediate rendering step before text extraction (legacy Office,
    /// OpenDocument, spreadsheets, presentations, ebooks)
    LegacyConvert,
    /// Structured data parsed into tabular elements rather than prose
    StructuredData,
}

impl std::fmt::Display for ExtractorFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NativeText => "native_text",
            Self::Ocr => "ocr",
            Self::Transcription => "transcription",
            Self::LegacyConvert => "legacy_convert",
            Self::StructuredData => "structured_data",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// INTERMEDIATE REPRESENTATION
// =============================================================================

/// Bounding box in the source document's coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// The kind of a page content element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ElementKind {
    Paragraph,
    Heading { level: u8 },
    Table,
    Image,
    Caption,
}

/// A typed unit of page content. Elements within a page preserve source
/// reading order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(flatten)]
    pub kind: ElementKind,
    /// Text content. For tables this is the flattened representation.
    pub text: String,
    /// Structured cell matrix, present only for table elements when
    /// `extract_tables` is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cells: Option<Vec<Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl Element {
    /// Create a paragraph element.
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Paragraph,
            text: text.into(),
            cells: None,
            bbox: None,
        }
    }

    /// Create a heading element at the given level.
    pub fn heading(level: u8, text: impl Into<String>) -> Self {
        Self {
            kind: ElementKind::Heading { level },
            text: text.into(),
            cells: None,
            bbox: None,
        }
    }

    /// Create a table element from a cell matrix. The text field holds the
    /// flattened representation (rows joined by newlines, cells by tabs).
    pub fn table(cells: Vec<Vec<String>>) -> Self {
        let text = flatten_cells(&cells);
        Self {
            kind: ElementKind::Table,
            text,
            cells: Some(cells),
            bbox: None,
        }
    }

    pub fn is_table(&self) -> bool {
        self.kind == ElementKind::Table
    }

    pub fn is_heading(&self) -> bool {
        matches!(self.kind, ElementKind::Heading { .. })
    }
}

/// Flatten a table cell matrix into text: rows joined by newlines, cells by
/// tab characters.
pub fn flatten_cells(cells: &[Vec<String>]) -> String {
    cells
        .iter()
        .map(|row| row.join("\t"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One normalized page: an ordered container of elements with derived text
/// and word count. Page numbers are 1-based and contiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntermediatePage {
    pub number: u32,
    pub text: String,
    pub word_count: usize,
    pub elements: Vec<Element>,
    /// References to images embedded on this page (identifiers, not bytes).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_refs: Vec<String>,
}

// =============================================================================
// CHUNKING
// =============================================================================

/// Chunk construction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Accumulate elements up to a soft size target, flushing at structural
    /// boundaries; tables are isolated into their own chunks.
    #[default]
    Semantic,
    /// Fixed-size character windows with configured overlap.
    Fixed,
    /// One chunk per page, no splitting.
    None,
}

impl std::fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Semantic => write!(f, "semantic"),
            Self::Fixed => write!(f, "fixed"),
            Self::None => write!(f, "none"),
        }
    }
}

impl std::str::FromStr for ChunkStrategy {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "semantic" => Ok(Self::Semantic),
            "fixed" => Ok(Self::Fixed),
            "none" => Ok(Self::None),
            _ => Err(format!("Invalid chunk strategy: {}", s)),
        }
    }
}

/// A contiguous span of extracted text sized for LLM consumption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// 0-based sequence position.
    pub index: usize,
    pub text: String,
    pub token_count: usize,
    /// Every source page this chunk's text was derived from.
    pub source_pages: Vec<u32>,
    /// Strategy that produced this chunk.
    pub strategy: ChunkStrategy,
}

// =============================================================================
// CONVERSION OPTIONS
// =============================================================================

fn default_chunk_size() -> usize {
    defaults::CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    defaults::CHUNK_OVERLAP
}
fn default_true() -> bool {
    true
}

/// Caller-supplied conversion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOptions {
    #[serde(default)]
    pub chunk_strategy: ChunkStrategy,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_true")]
    pub extract_tables: bool,
    #[serde(default = "default_true")]
    pub ocr_enabled: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            chunk_strategy: ChunkStrategy::default(),
            chunk_size: defaults::CHUNK_SIZE,
            chunk_overlap: defaults::CHUNK_OVERLAP,
            extract_tables: true,
            ocr_enabled: true,
        }
    }
}

impl ConversionOptions {
    /// Validate numeric bounds. Out-of-range values are rejected, never
    /// silently clamped.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size < defaults::CHUNK_SIZE_MIN
            || self.chunk_size > defaults::CHUNK_SIZE_MAX
        {
            return Err(Error::InvalidConfiguration(format!(
                "chunk_size must be in [{}, {}], got {}",
                defaults::CHUNK_SIZE_MIN,
                defaults::CHUNK_SIZE_MAX,
                self.chunk_size
            )));
        }
        if self.chunk_overlap > defaults::CHUNK_OVERLAP_MAX {
            return Err(Error::InvalidConfiguration(format!(
                "chunk_overlap must be in [0, {}], got {}",
                defaults::CHUNK_OVERLAP_MAX,
                self.chunk_overlap
            )));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfiguration(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

// =============================================================================
// CONVERSION JOB
// =============================================================================

/// Lifecycle state of a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Submitted,
    Admitted,
    Classifying,
    Extracting,
    Normalizing,
    Chunking,
    Completed,
    Failed,
}

impl JobState {
    /// Terminal states can no longer transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::Admitted => "admitted",
            Self::Classifying => "classifying",
            Self::Extracting => "extracting",
            Self::Normalizing => "normalizing",
            Self::Chunking => "chunking",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Structured error recorded on a failed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    /// Stable wire code (see [`crate::Error::code`]).
    pub code: String,
    pub message: String,
}

impl From<&Error> for JobError {
    fn from(err: &Error) -> Self {
        // Internal detail never reaches the caller; the full error is
        // logged at the failure site.
        let message = match err {
            Error::Internal(_) | Error::Io(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        Self {
            code: err.code().to_string(),
            message,
        }
    }
}

/// Input document metadata carried on the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub filename: String,
    pub declared_mime: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_kind: Option<DocumentKind>,
    pub size_bytes: u64,
}

/// Aggregated statistics for a completed conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub total_pages: usize,
    pub total_words: usize,
    pub total_chunks: usize,
    pub total_tokens: usize,
    /// Wall-clock elapsed from job start to completion, in milliseconds.
    pub processing_ms: u64,
}

/// Output of a completed conversion: normalized pages, chunks, statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub pages: Vec<IntermediatePage>,
    pub chunks: Vec<Chunk>,
    pub stats: ConversionStats,
}

/// One conversion request's lifecycle. Created on admission, mutated only
/// by the orchestrator, terminal once completed or failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionJob {
    pub id: Uuid,
    /// API key identity the request was admitted under.
    pub api_key_id: String,
    pub document: DocumentMeta,
    pub options: ConversionOptions,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<ConversionOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    /// Coarse pipeline progress, updated at stage boundaries.
    pub progress_percent: i32,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Free-form extractor metadata (page counts, detected language, ...).
    #[serde(default, skip_serializing_if = "JsonValue::is_null")]
    pub metadata: JsonValue,
}

impl ConversionJob {
    /// Create a new job in the `submitted` state with a time-ordered id.
    pub fn new(api_key_id: impl Into<String>, document: DocumentMeta, options: ConversionOptions) -> Self {
        Self {
            id: Uuid::now_v7(),
            api_key_id: api_key_id.into(),
            document,
            options,
            state: JobState::Submitted,
            output: None,
            error: None,
            progress_percent: 0,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            metadata: JsonValue::Null,
        }
    }

    /// Record a successful completion.
    pub fn complete(&mut self, output: ConversionOutput) {
        self.state = JobState::Completed;
        self.progress_percent = 100;
        self.output = Some(output);
        self.completed_at = Some(Utc::now());
    }

    /// Record a failure. The job becomes terminal; there is no automatic
    /// retry — reprocessing is a new conversion request.
    pub fn fail(&mut self, err: &Error) {
        self.state = JobState::Failed;
        self.error = Some(JobError::from(err));
        self.completed_at = Some(Utc::now());
    }
}

// =============================================================================
// API KEYS
// =============================================================================

/// API key record resolved by the external authentication collaborator
/// before the core is invoked. Carries the per-key admission limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub id: String,
    /// Requests-per-minute capacity.
    pub rpm: u32,
    /// Requests-per-day capacity.
    pub rpd: u32,
}

impl Default for ApiKeyRecord {
    fn default() -> Self {
        Self {
            id: "anonymous".to_string(),
            rpm: defaults::RATE_LIMIT_RPM,
            rpd: defaults::RATE_LIMIT_RPD,
        }
    }
}
