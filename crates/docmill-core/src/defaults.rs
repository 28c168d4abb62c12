//! Centralized default constants for the docmill system.
//!
//! **This module is the single source of truth** for all shared default
//! values. All crates reference these constants instead of defining their
//! own magic numbers. Organized by domain area; document the rationale for
//! any new value.

// =============================================================================
// CHUNKING
// =============================================================================

/// Default maximum characters per chunk.
pub const CHUNK_SIZE: usize = 1000;

/// Default overlap characters between adjacent fixed-size chunks.
pub const CHUNK_OVERLAP: usize = 100;

/// Lower bound on `chunk_size` accepted from callers.
pub const CHUNK_SIZE_MIN: usize = 100;

/// Upper bound on `chunk_size` accepted from callers.
pub const CHUNK_SIZE_MAX: usize = 10_000;

/// Upper bound on `chunk_overlap` accepted from callers.
pub const CHUNK_OVERLAP_MAX: usize = 500;

/// Separator inserted between page texts when pages are concatenated for
/// fixed-size chunking. Marks page boundaries in the joined document text.
pub const PAGE_SEPARATOR: &str = "\n\n";

// =============================================================================
// TOKENIZATION
// =============================================================================

/// Heuristic ratio of characters per token for the fast estimator.
pub const CHARS_PER_TOKEN: f32 = 3.7;

/// Environment variable selecting the tokenizer implementation
/// (`heuristic` or `cl100k`).
pub const ENV_TOKENIZER: &str = "TOKENIZER";

// =============================================================================
// RATE LIMITING
// =============================================================================

/// Default per-key requests-per-minute capacity.
pub const RATE_LIMIT_RPM: u32 = 60;

/// Default per-key requests-per-day capacity.
pub const RATE_LIMIT_RPD: u32 = 1000;

/// Length of the minute admission window in seconds.
pub const MINUTE_WINDOW_SECS: i64 = 60;

/// Length of the day admission window in seconds.
pub const DAY_WINDOW_SECS: i64 = 86_400;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8080;

/// Maximum accepted payload size in bytes (100 MB), enforced before
/// classification.
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Default CORS max-age in seconds (1 hour).
pub const CORS_MAX_AGE_SECS: u64 = 3600;

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Default maximum concurrent conversion jobs per worker.
pub const WORKER_MAX_CONCURRENT: usize = 4;

/// Capacity of the worker's in-process job queue.
pub const WORKER_QUEUE_CAPACITY: usize = 256;

/// Default worker event broadcast channel capacity.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// Overall conversion job deadline in seconds (5 minutes).
pub const JOB_TIMEOUT_SECS: u64 = 300;

/// Per-command timeout for external extraction tools (seconds).
pub const EXTRACTION_CMD_TIMEOUT_SECS: u64 = 60;

// =============================================================================
// EXTRACTION SERVICE CONFIGURATION
// =============================================================================

/// Environment variable for the Whisper transcription server URL.
/// Transcription is unavailable when unset.
pub const ENV_WHISPER_BASE_URL: &str = "WHISPER_BASE_URL";

/// Environment variable overriding the OCR binary name.
pub const ENV_OCR_COMMAND: &str = "OCR_COMMAND";

/// Default OCR binary.
pub const DEFAULT_OCR_COMMAND: &str = "tesseract";

/// Timeout for transcription HTTP requests in seconds.
pub const TRANSCRIBE_TIMEOUT_SECS: u64 = 120;

/// Minimum trimmed text length below which a PDF page is treated as
/// image-only (a scanned page with no usable text layer).
pub const PDF_TEXT_LAYER_MIN_CHARS: usize = 8;
