//! Chunk construction over normalized pages.
//!
//! A state-free pure function: the same pages and configuration always
//! yield a byte-identical chunk sequence.
//!
//! Strategies:
//! - `none`: one chunk per page's full text, in page order.
//! - `fixed`: page texts concatenated (page boundaries marked by the page
//!   separator), then a window of `chunk_size` characters slides forward
//!   by `chunk_size - overlap` per step. The final window is truncated.
//!   All arithmetic is in characters, not bytes.
//! - `semantic`: elements accumulate into the current chunk until a
//!   structural boundary (heading transition, table element) forces a
//!   flush or the soft size target would be exceeded at an element
//!   boundary. Tables are always isolated into their own chunk. Never
//!   splits inside an element.

use docmill_core::defaults::PAGE_SEPARATOR;
use docmill_core::{
    Chunk, ChunkStrategy, ConversionOptions, Element, IntermediatePage, Result, Tokenizer,
};

/// Produce the ordered chunk sequence for the given pages.
///
/// Options are validated before any work; out-of-range values fail with
/// `InvalidConfiguration` rather than being clamped.
pub fn chunk(
    pages: &[IntermediatePage],
    options: &ConversionOptions,
    tokenizer: &dyn Tokenizer,
) -> Result<Vec<Chunk>> {
    options.validate()?;

    let chunks = match options.chunk_strategy {
        ChunkStrategy::None => chunk_none(pages),
        ChunkStrategy::Fixed => chunk_fixed(pages, options.chunk_size, options.chunk_overlap),
        ChunkStrategy::Semantic => chunk_semantic(pages, options.chunk_size),
    };

    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(index, (text, source_pages))| {
            let token_count = tokenizer.count_tokens(&text);
            Chunk {
                index,
                text,
                token_count,
                source_pages,
                strategy: options.chunk_strategy,
            }
        })
        .collect())
}

/// One chunk per page, no splitting.
fn chunk_none(pages: &[IntermediatePage]) -> Vec<(String, Vec<u32>)> {
    pages
        .iter()
        .map(|page| (page.text.clone(), vec![page.number]))
        .collect()
}

/// Sliding character window over the concatenated document text.
fn chunk_fixed(
    pages: &[IntermediatePage],
    chunk_size: usize,
    overlap: usize,
) -> Vec<(String, Vec<u32>)> {
    // Concatenate page texts, recording each page's character span in the
    // joined text so chunks can name their source pages.
    let mut doc = String::new();
    let mut spans: Vec<(u32, std::ops::Range<usize>)> = Vec::new();
    let mut char_pos = 0usize;

    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            doc.push_str(PAGE_SEPARATOR);
            char_pos += PAGE_SEPARATOR.chars().count();
        }
        let page_chars = page.text.chars().count();
        spans.push((page.number, char_pos..char_pos + page_chars));
        doc.push_str(&page.text);
        char_pos += page_chars;
    }

    let chars: Vec<char> = doc.chars().collect();
    let total = chars.len();
    if total == 0 {
        return Vec::new();
    }

    // overlap < chunk_size is validated upstream.
    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + chunk_size).min(total);
        let text: String = chars[start..end].iter().collect();
        let source_pages: Vec<u32> = spans
            .iter()
            .filter(|(_, span)| span.start < end && span.end > start)
            .map(|(number, _)| *number)
            .collect();
        chunks.push((text, source_pages));

        if end == total {
            break;
        }
        start += step;
    }

    chunks
}

/// Accumulate elements into chunks, flushing at structural boundaries.
fn chunk_semantic(pages: &[IntermediatePage], soft_target: usize) -> Vec<(String, Vec<u32>)> {
    let mut chunks: Vec<(String, Vec<u32>)> = Vec::new();
    let mut current: Vec<(&Element, u32)> = Vec::new();
    let mut current_len = 0usize;

    fn flush(chunks: &mut Vec<(String, Vec<u32>)>, current: &mut Vec<(&Element, u32)>) {
        if current.is_empty() {
            return;
        }
        let text = current
            .iter()
            .map(|(el, _)| el.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let mut source_pages: Vec<u32> = current.iter().map(|(_, page)| *page).collect();
        source_pages.dedup();
        chunks.push((text, source_pages));
        current.clear();
    }

    for page in pages {
        for element in &page.elements {
            if element.text.is_empty() {
                continue;
            }

            if element.is_table() {
                // Tables are isolated: flush before, emit alone, continue.
                flush(&mut chunks, &mut current);
                current_len = 0;
                chunks.push((element.text.clone(), vec![page.number]));
                continue;
            }

            let element_len = element.text.chars().count();

            // A heading starts a new chunk; so does exceeding the soft
            // size target at this element boundary.
            let structural_break = element.is_heading() && !current.is_empty();
            let size_break =
                !current.is_empty() && current_len + element_len > soft_target;
            if structural_break || size_break {
                flush(&mut chunks, &mut current);
                current_len = 0;
            }

            current_len += element_len;
            current.push((element, page.number));
        }
    }
    flush(&mut chunks, &mut current);

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmill_core::{ElementKind, HeuristicTokenizer};

    fn page(number: u32, elements: Vec<Element>) -> IntermediatePage {
        let text = elements
            .iter()
            .map(|el| el.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        let word_count = text.split_whitespace().count();
        IntermediatePage {
            number,
            text,
            word_count,
            elements,
            image_refs: Vec::new(),
        }
    }

    fn text_page(number: u32, text: &str) -> IntermediatePage {
        page(number, vec![Element::paragraph(text)])
    }

    fn options(strategy: ChunkStrategy, size: usize, overlap: usize) -> ConversionOptions {
        ConversionOptions {
            chunk_strategy: strategy,
            chunk_size: size,
            chunk_overlap: overlap,
            ..Default::default()
        }
    }

    #[test]
    fn test_none_one_chunk_per_page() {
        let pages = vec![text_page(1, "first"), text_page(2, "second")];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::None, 1000, 100),
            &HeuristicTokenizer,
        )
        .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "first");
        assert_eq!(chunks[0].source_pages, vec![1]);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(chunks[1].source_pages, vec![2]);
        assert!(chunks.iter().all(|c| c.strategy == ChunkStrategy::None));
    }

    #[test]
    fn test_fixed_window_boundaries_2400_chars() {
        // 2400 chars, size 1000, overlap 100 → boundaries at [0,1000),
        // [900,1900), [1800,2400)
        let text: String = ('a'..='z').cycle().take(2400).collect();
        let pages = vec![text_page(1, &text)];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Fixed, 1000, 100),
            &HeuristicTokenizer,
        )
        .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text.chars().count(), 1000);
        assert_eq!(chunks[1].text.chars().count(), 1000);
        assert_eq!(chunks[2].text.chars().count(), 600);

        let chars: Vec<char> = text.chars().collect();
        let expect = |range: std::ops::Range<usize>| -> String { chars[range].iter().collect() };
        assert_eq!(chunks[0].text, expect(0..1000));
        assert_eq!(chunks[1].text, expect(900..1900));
        assert_eq!(chunks[2].text, expect(1800..2400));

        // Each successive pair shares exactly 100 overlapping characters.
        let tail: String = chunks[0].text.chars().skip(900).collect();
        let head: String = chunks[1].text.chars().take(100).collect();
        assert_eq!(tail, head);
    }

    #[test]
    fn test_fixed_round_trip_reconstruction() {
        // Dropping each chunk's leading `overlap` chars (after the first)
        // and concatenating reconstructs the original exactly.
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let pages = vec![text_page(1, text.trim_end())];
        let size = 300;
        let overlap = 60;
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Fixed, size, overlap),
            &HeuristicTokenizer,
        )
        .unwrap();

        let mut rebuilt = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                rebuilt.push_str(&c.text);
            } else {
                rebuilt.extend(c.text.chars().skip(overlap));
            }
        }
        assert_eq!(rebuilt, text.trim_end());
    }

    #[test]
    fn test_fixed_final_chunk_shorter_is_emitted() {
        let pages = vec![text_page(1, &"x".repeat(250))];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Fixed, 200, 50),
            &HeuristicTokenizer,
        )
        .unwrap();
        // [0,200), [150,250)
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].text.chars().count(), 100);
    }

    #[test]
    fn test_fixed_input_shorter_than_window() {
        let pages = vec![text_page(1, &"y".repeat(120))];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Fixed, 1000, 100),
            &HeuristicTokenizer,
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.chars().count(), 120);
    }

    #[test]
    fn test_fixed_records_source_pages_across_boundaries() {
        let pages = vec![
            text_page(1, &"a".repeat(600)),
            text_page(2, &"b".repeat(600)),
        ];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Fixed, 500, 0),
            &HeuristicTokenizer,
        )
        .unwrap();

        // First window is entirely inside page 1.
        assert_eq!(chunks[0].source_pages, vec![1]);
        // Some window must straddle the page boundary.
        assert!(chunks.iter().any(|c| c.source_pages == vec![1, 2]));
        // Last window is entirely inside page 2.
        assert_eq!(chunks.last().unwrap().source_pages, vec![2]);
    }

    #[test]
    fn test_fixed_multibyte_chars_counted_not_bytes() {
        // 300 three-byte chars; windows must split on char boundaries.
        let text = "語".repeat(300);
        let pages = vec![text_page(1, &text)];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Fixed, 250, 50),
            &HeuristicTokenizer,
        )
        .unwrap();
        assert_eq!(chunks[0].text.chars().count(), 250);
        assert_eq!(chunks[1].text.chars().count(), 100);
    }

    #[test]
    fn test_fixed_empty_pages_yield_no_chunks() {
        let pages = vec![page(1, vec![])];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Fixed, 1000, 100),
            &HeuristicTokenizer,
        )
        .unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_semantic_boundaries_fall_on_elements() {
        let pages = vec![page(
            1,
            vec![
                Element::heading(1, "Intro"),
                Element::paragraph("a".repeat(400)),
                Element::paragraph("b".repeat(400)),
                Element::paragraph("c".repeat(400)),
            ],
        )];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Semantic, 1000, 100),
            &HeuristicTokenizer,
        )
        .unwrap();

        // Every chunk is a join of whole element texts.
        for c in &chunks {
            for part in c.text.split("\n\n") {
                assert!(
                    part == "Intro"
                        || part.chars().all(|ch| ch == 'a')
                        || part.chars().all(|ch| ch == 'b')
                        || part.chars().all(|ch| ch == 'c'),
                    "chunk boundary fell inside an element: {:?}",
                    part
                );
            }
        }
        // 400*3 + heading > 1000, so the third paragraph starts a new chunk.
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn test_semantic_heading_starts_new_chunk() {
        let pages = vec![page(
            1,
            vec![
                Element::paragraph("before"),
                Element::heading(2, "Section"),
                Element::paragraph("after"),
            ],
        )];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Semantic, 1000, 100),
            &HeuristicTokenizer,
        )
        .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "before");
        assert_eq!(chunks[1].text, "Section\n\nafter");
    }

    #[test]
    fn test_semantic_tables_are_isolated() {
        let table = Element::table(vec![
            vec!["h1".into(), "h2".into()],
            vec!["1".into(), "2".into()],
        ]);
        let table_text = table.text.clone();
        let pages = vec![page(
            1,
            vec![
                Element::paragraph("prose before"),
                table,
                Element::paragraph("prose after"),
            ],
        )];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Semantic, 1000, 100),
            &HeuristicTokenizer,
        )
        .unwrap();

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "prose before");
        assert_eq!(chunks[1].text, table_text);
        assert_eq!(chunks[2].text, "prose after");
    }

    #[test]
    fn test_semantic_oversized_element_is_not_split() {
        let big = "z".repeat(5000);
        let pages = vec![page(1, vec![Element::paragraph(big.clone())])];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Semantic, 1000, 100),
            &HeuristicTokenizer,
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, big);
    }

    #[test]
    fn test_semantic_source_pages_deduped() {
        let pages = vec![
            page(1, vec![Element::paragraph("a"), Element::paragraph("b")]),
            page(2, vec![Element::paragraph("c")]),
        ];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Semantic, 1000, 100),
            &HeuristicTokenizer,
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source_pages, vec![1, 2]);
    }

    #[test]
    fn test_chunking_is_idempotent() {
        let pages = vec![
            page(
                1,
                vec![
                    Element::heading(1, "T"),
                    Element::paragraph("lorem ipsum ".repeat(100)),
                ],
            ),
            text_page(2, &"dolor sit amet ".repeat(80)),
        ];
        for strategy in [ChunkStrategy::None, ChunkStrategy::Fixed, ChunkStrategy::Semantic] {
            let opts = options(strategy, 500, 50);
            let a = chunk(&pages, &opts, &HeuristicTokenizer).unwrap();
            let b = chunk(&pages, &opts, &HeuristicTokenizer).unwrap();
            assert_eq!(a, b, "strategy {:?} not idempotent", strategy);
        }
    }

    #[test]
    fn test_invalid_configuration_rejected() {
        let pages = vec![text_page(1, "text")];
        let err = chunk(
            &pages,
            &options(ChunkStrategy::Fixed, 50, 0),
            &HeuristicTokenizer,
        )
        .unwrap_err();
        assert_eq!(err.code(), "INVALID_CONFIGURATION");

        // overlap == chunk_size is rejected, not clamped
        assert!(chunk(
            &pages,
            &options(ChunkStrategy::Fixed, 500, 500),
            &HeuristicTokenizer,
        )
        .is_err());
    }

    #[test]
    fn test_token_counts_populated_and_deterministic() {
        let pages = vec![text_page(1, &"token counting text ".repeat(30))];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Fixed, 200, 0),
            &HeuristicTokenizer,
        )
        .unwrap();
        for c in &chunks {
            assert!(c.token_count > 0);
            assert_eq!(
                c.token_count,
                HeuristicTokenizer.count_tokens(&c.text),
                "token count must match the tokenizer output"
            );
        }
    }

    #[test]
    fn test_chunk_indexes_are_sequential() {
        let pages = vec![text_page(1, &"w".repeat(1000))];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Fixed, 200, 50),
            &HeuristicTokenizer,
        )
        .unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn test_semantic_skips_empty_elements() {
        let pages = vec![page(
            1,
            vec![
                Element::paragraph(""),
                Element::paragraph("real content"),
            ],
        )];
        let chunks = chunk(
            &pages,
            &options(ChunkStrategy::Semantic, 1000, 100),
            &HeuristicTokenizer,
        )
        .unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "real content");
    }

    #[test]
    fn test_element_kind_available_for_consumers() {
        // Table chunks retain the flattened text produced by the element
        let table = Element::table(vec![vec!["only".into()]]);
        assert_eq!(table.kind, ElementKind::Table);
    }
}
