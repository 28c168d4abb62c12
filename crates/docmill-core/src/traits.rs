//! Trait seams: extractors, job persistence, API key resolution.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ApiKeyRecord, ConversionJob, DocumentKind, Element, ExtractorFamily};

// =============================================================================
// EXTRACTOR TRAITS
// =============================================================================

/// Options forwarded to extractors. A subset of the conversion options —
/// extractors never see chunking configuration.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions {
    pub ocr_enabled: bool,
    pub extract_tables: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            extract_tables: true,
        }
    }
}

/// One page of raw extractor output, before normalization assigns page
/// numbers and word counts.
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    /// Typed content in source reading order.
    pub elements: Vec<Element>,
    /// References to images embedded on this page.
    pub image_refs: Vec<String>,
}

impl RawPage {
    pub fn from_elements(elements: Vec<Element>) -> Self {
        Self {
            elements,
            image_refs: Vec::new(),
        }
    }
}

/// Raw extractor output: ordered pages plus format-specific metadata.
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    pub pages: Vec<RawPage>,
    /// Format-specific extraction metadata (page counts, detected
    /// language, converter used, ...).
    pub metadata: JsonValue,
}

impl RawDocument {
    pub fn single_page(elements: Vec<Element>) -> Self {
        Self {
            pages: vec![RawPage::from_elements(elements)],
            metadata: JsonValue::Null,
        }
    }
}

/// Capability interface for turning raw document bytes of one technology
/// family into a raw intermediate document.
///
/// Each extractor handles one [`ExtractorFamily`]. Extractors are
/// registered in an `ExtractorRegistry` and dispatched by the detected
/// `DocumentKind`'s family — no content sniffing beyond classification.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// The technology family this extractor handles.
    fn family(&self) -> ExtractorFamily;

    /// Extract a raw document from file bytes. The classified kind is
    /// passed through so family extractors covering several kinds can
    /// pick the right backend without re-sniffing content.
    async fn extract(
        &self,
        kind: DocumentKind,
        data: &[u8],
        filename: &str,
        options: &ExtractOptions,
    ) -> Result<RawDocument>;

    /// Whether this extractor can run OCR on image-only content.
    fn supports_ocr(&self) -> bool {
        false
    }

    /// Whether this extractor produces structured table cells.
    fn supports_tables(&self) -> bool {
        false
    }

    /// Check if the extractor's external dependencies are available.
    async fn health_check(&self) -> Result<bool>;

    /// Human-readable name of this extractor.
    fn name(&self) -> &str;
}

// =============================================================================
// JOB PERSISTENCE
// =============================================================================

/// Narrow persistence seam for conversion jobs. Durable storage is an
/// external collaborator; the core never assumes a specific engine.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a newly created job.
    async fn create(&self, job: &ConversionJob) -> Result<()>;

    /// Persist the job's current state.
    async fn update(&self, job: &ConversionJob) -> Result<()>;

    /// Fetch a job by id.
    async fn get(&self, id: Uuid) -> Result<Option<ConversionJob>>;
}

// =============================================================================
// API KEY RESOLUTION
// =============================================================================

/// Resolves a raw API key credential to a key record with admission
/// limits. Authentication itself is an external collaborator; the core
/// only consumes the resolved record.
#[async_trait]
pub trait ApiKeyProvider: Send + Sync {
    /// Resolve a raw key. `None` means the key is unknown.
    async fn resolve(&self, raw_key: &str) -> Result<Option<ApiKeyRecord>>;
}
