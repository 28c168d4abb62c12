//! # docmill-engine
//!
//! The conversion pipeline engine: extractor implementations and
//! registry, normalization, chunking, statistics, per-key admission
//! control, job storage, the background worker pool, and the orchestrator
//! that composes them.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use docmill_core::{ApiKeyRecord, ConversionOptions, HeuristicTokenizer};
//! use docmill_engine::{
//!     standard_registry, ConversionRequest, ConversionWorker, MemoryJobStore, Orchestrator,
//!     OrchestratorConfig, RateLimiter, WorkerConfig,
//! };
//!
//! let orchestrator = Arc::new(Orchestrator::new(
//!     Arc::new(standard_registry()),
//!     Arc::new(MemoryJobStore::new()),
//!     Arc::new(RateLimiter::new()),
//!     Arc::new(HeuristicTokenizer),
//!     OrchestratorConfig::from_env(),
//! ));
//!
//! // Synchronous path
//! let job = orchestrator.convert_sync(ConversionRequest {
//!     api_key: ApiKeyRecord::default(),
//!     filename: "notes.md".into(),
//!     declared_mime: "text/markdown".into(),
//!     data: b"# Hello".to_vec(),
//!     options: ConversionOptions::default(),
//! }).await?;
//!
//! // Asynchronous path
//! let handle = ConversionWorker::new(orchestrator.clone(), WorkerConfig::from_env()).start();
//! let job = orchestrator.submit(request).await?;
//! handle.submitter().submit(job.id).await?;
//! ```

pub mod chunker;
pub mod extract;
pub mod normalize;
pub mod orchestrator;
pub mod ratelimit;
pub mod registry;
pub mod stats;
pub mod store;
pub mod worker;

// Re-export core types
pub use docmill_core::*;

pub use extract::{
    LegacyConvertExtractor, NativeTextExtractor, OcrEngine, OcrExtractor,
    StructuredDataExtractor, TranscribeExtractor, WhisperHttpBackend,
};
pub use orchestrator::{ConversionRequest, Orchestrator, OrchestratorConfig};
pub use ratelimit::{Admission, QuotaSnapshot, RateLimiter};
pub use registry::ExtractorRegistry;
pub use store::MemoryJobStore;
pub use worker::{ConversionWorker, JobSubmitter, WorkerConfig, WorkerEvent, WorkerHandle};

use std::sync::Arc;

/// Build the standard extractor registry: every family the environment can
/// support. Transcription is registered only when a Whisper server is
/// configured; audio conversions fail with `ExtractorUnavailable` at
/// dispatch otherwise.
pub fn standard_registry() -> ExtractorRegistry {
    let mut registry = ExtractorRegistry::new();

    let ocr_engine = Arc::new(OcrEngine::from_env());
    registry.register(Arc::new(NativeTextExtractor::new(Some(ocr_engine.clone()))));
    registry.register(Arc::new(OcrExtractor::new(ocr_engine)));
    registry.register(Arc::new(LegacyConvertExtractor));
    registry.register(Arc::new(StructuredDataExtractor));
    if let Some(transcribe) = TranscribeExtractor::from_env() {
        registry.register(Arc::new(transcribe));
    }

    registry
}
