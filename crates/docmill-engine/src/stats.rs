//! Statistics aggregation over the final pages and chunks.

use std::time::Duration;

use docmill_core::{Chunk, ConversionStats, IntermediatePage};

/// Compute totals from the pipeline outputs. Pure function; the elapsed
/// time is measured by the orchestrator and injected here.
pub fn aggregate(pages: &[IntermediatePage], chunks: &[Chunk], elapsed: Duration) -> ConversionStats {
    ConversionStats {
        total_pages: pages.len(),
        total_words: pages.iter().map(|p| p.word_count).sum(),
        total_chunks: chunks.len(),
        total_tokens: chunks.iter().map(|c| c.token_count).sum(),
        processing_ms: elapsed.as_millis() as u64,
    }
}
