//! Structured logging schema and field name constants for docmill.
//!
//! All crates use these constants for consistent structured logging fields
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (pages, chunks) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → job → sub-calls.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "engine", "core"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "classifier", "registry", "chunker", "ratelimit", "worker"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "classify", "extract", "chunk", "admit"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Conversion job UUID being processed.
pub const JOB_ID: &str = "job_id";

/// API key identity the request was admitted under.
pub const API_KEY_ID: &str = "api_key_id";

/// Detected document kind.
pub const DOCUMENT_KIND: &str = "document_kind";

/// Chunking strategy in effect.
pub const STRATEGY: &str = "strategy";

/// Uploaded filename.
pub const FILENAME: &str = "filename";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of pages produced by normalization.
pub const PAGE_COUNT: &str = "page_count";

/// Number of chunks produced.
pub const CHUNK_COUNT: &str = "chunk_count";

/// Total words across all pages.
pub const WORD_COUNT: &str = "word_count";

/// Total tokens across all chunks.
pub const TOKEN_COUNT: &str = "token_count";

/// Byte length of the uploaded payload.
pub const PAYLOAD_BYTES: &str = "payload_bytes";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Stable error code attached to a failed job.
pub const ERROR_CODE: &str = "error_code";
