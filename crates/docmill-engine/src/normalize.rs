//! Normalization: heterogeneous raw extractor output → the common
//! intermediate representation consumed by chunking and statistics.
//!
//! Guarantees: contiguous 1-based page numbers, Unicode-aware word counts,
//! element order preserved, and idempotence — normalizing the same raw
//! output twice yields identical pages (no randomness, no wall-clock
//! values).

use docmill_core::{
    ConversionOptions, Element, ElementKind, IntermediatePage, RawDocument,
};

/// Count whitespace-delimited tokens, Unicode-aware.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Normalize raw extractor output into ordered intermediate pages.
///
/// Extractors producing no pages at all (e.g. an empty transcript) still
/// yield one synthetic page so page numbering is never empty.
pub fn normalize(raw: RawDocument, options: &ConversionOptions) -> Vec<IntermediatePage> {
    let mut raw_pages = raw.pages;
    if raw_pages.is_empty() {
        raw_pages.push(Default::default());
    }

    raw_pages
        .into_iter()
        .enumerate()
        .map(|(idx, page)| {
            let elements: Vec<Element> = page
                .elements
                .into_iter()
                .map(|el| demote_table_if_disabled(el, options.extract_tables))
                .collect();

            let text = elements
                .iter()
                .map(|el| el.text.as_str())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("\n\n");
            let words = word_count(&text);

            IntermediatePage {
                number: (idx + 1) as u32,
                text,
                word_count: words,
                elements,
                image_refs: page.image_refs,
            }
        })
        .collect()
}

/// With `extract_tables=false`, table elements are demoted to their
/// flattened text representation instead of structured cells.
fn demote_table_if_disabled(element: Element, extract_tables: bool) -> Element {
    if extract_tables || !element.is_table() {
        return element;
    }
    Element {
        kind: ElementKind::Paragraph,
        text: element.text,
        cells: None,
        bbox: element.bbox,
    }
}
