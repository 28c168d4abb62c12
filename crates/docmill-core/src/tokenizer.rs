//! Token counting for chunk accounting.
//!
//! Two implementations behind one trait: a fast deterministic estimator
//! (the default) and a tiktoken-backed counter compatible with OpenAI's
//! cl100k_base scheme. Exact numeric parity with any specific tokenizer is
//! not a contract — determinism and consistency across runs are.

use std::sync::Arc;

use crate::defaults;
use crate::error::{Error, Result};

/// Trait for token counting operations.
///
/// Implementations must be thread-safe and deterministic: identical text
/// yields an identical count on every call.
pub trait Tokenizer: Send + Sync {
    /// Count the number of tokens in the given text.
    fn count_tokens(&self, text: &str) -> usize;

    /// Get the name/identifier of this tokenizer.
    fn name(&self) -> &str;
}

/// Heuristic estimator: ~3.7 characters per token for English text,
/// rounded up. Much faster than full tokenization; this is the default.
#[derive(Debug, Clone, Default)]
pub struct HeuristicTokenizer;

impl Tokenizer for HeuristicTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

/// Tiktoken-based tokenizer using cl100k_base.
pub struct TiktokenTokenizer {
    bpe: tiktoken_rs::CoreBPE,
    name: String,
}

impl TiktokenTokenizer {
    /// Create a cl100k_base tokenizer.
    ///
    /// # Errors
    /// Returns an error if BPE initialization fails.
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| Error::Internal(format!("Failed to initialize cl100k_base: {}", e)))?;

        Ok(Self {
            bpe,
            name: "cl100k_base".to_string(),
        })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Quickly estimate token count without full tokenization.
///
/// Uses a heuristic ratio of ~3.7 characters per token for English text
/// (rounded up). Deterministic by construction.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() as f32 / defaults::CHARS_PER_TOKEN).ceil() as usize
}

/// Select a tokenizer from the `TOKENIZER` environment variable
/// (`heuristic` is the default, `cl100k` enables tiktoken). Falls back to
/// the heuristic when cl100k initialization fails.
pub fn tokenizer_from_env() -> Arc<dyn Tokenizer> {
    match std::env::var(defaults::ENV_TOKENIZER).as_deref() {
        Ok("cl100k") => match TiktokenTokenizer::cl100k() {
            Ok(t) => Arc::new(t),
            Err(e) => {
                tracing::warn!(error = %e, "cl100k tokenizer unavailable, using heuristic");
                Arc::new(HeuristicTokenizer)
            }
        },
        _ => Arc::new(HeuristicTokenizer),
    }
}
