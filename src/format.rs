//! Answer normalization: markup-rich Dify output into Messenger-safe text.
//!
//! Dify answers arrive with HTML anchors, bare URLs, markdown emphasis, and
//! list bullets that Messenger either renders literally or mangles. The
//! normalizer rewrites all of that into plain text with inline citation
//! markers plus a separate, deduplicated citation block.
//!
//! Pass order is load-bearing: citation extraction must run before the tag
//! strip (anchors are tags), and marker ungrouping must run after markers
//! exist in the text.

pub mod citations;
pub mod passes;

pub use citations::{Citation, marker_for_index};

use citations::CitationRegistry;

/// Normalized answer: plain body text with inline markers, plus the rendered
/// citation block. Derived deterministically from the raw answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedAnswer {
    /// Plain text with citation markers inline, markup stripped.
    pub body: String,

    /// Collected citations in first-seen order, deduplicated by URL.
    pub citations: Vec<Citation>,

    /// `marker label\nurl` entries, blank-line separated. None when the
    /// answer cited nothing.
    pub citation_block: Option<String>,
}

/// Normalize a raw Dify answer. Total: never fails, empty input yields an
/// empty body and no citations.
pub fn normalize(raw: &str) -> NormalizedAnswer {
    let mut registry = CitationRegistry::default();

    let text = citations::extract_anchors(raw, &mut registry);
    let text = citations::extract_bare_urls(&text, &mut registry);
    let text = passes::strip_tags(&text);
    let text = passes::indent_bullets(&text);
    let text = passes::strip_emphasis(&text);
    let text = passes::clean_whitespace(&text);
    let body = passes::ungroup_markers(&text);

    let citation_block = registry.render_block();
    NormalizedAnswer {
        body,
        citations: registry.into_citations(),
        citation_block,
    }
}
