//! Citation collection: anchor and bare-URL extraction with marker assignment.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static ANCHOR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\s+href="([^"]+)"[^>]*>([^<]*)</a>"#).expect("hardcoded anchor regex")
});

static BARE_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>]+").expect("hardcoded bare url regex"));

/// Label used when an anchor or bare URL carries no readable text.
pub const DEFAULT_LABEL: &str = "Source";

/// Superscript markers for the first fifteen citations. Indices past the
/// table fall back to a parenthesized decimal like `(16)`.
pub const SUPERSCRIPT_MARKERS: [&str; 15] = [
    "¹", "²", "³", "⁴", "⁵", "⁶", "⁷", "⁸", "⁹", "¹⁰", "¹¹", "¹²", "¹³", "¹⁴", "¹⁵",
];

/// Display marker for a zero-based citation index.
pub fn marker_for_index(index: usize) -> String {
    SUPERSCRIPT_MARKERS
        .get(index)
        .map(|marker| (*marker).to_string())
        .unwrap_or_else(|| format!("({})", index + 1))
}

/// One collected citation. `url` is the dedup key: the same URL always maps
/// to the same marker, whatever text later anchors carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub marker: String,
    pub url: String,
    pub label: String,
}

/// Citations in first-seen order, deduplicated by URL.
#[derive(Debug, Default)]
pub struct CitationRegistry {
    citations: Vec<Citation>,
    index_by_url: HashMap<String, usize>,
}

impl CitationRegistry {
    /// Return the marker for `url`, registering it on first sight.
    ///
    /// The first registration's label wins; an empty label renders as
    /// [`DEFAULT_LABEL`].
    pub fn marker_for(&mut self, url: &str, label: &str) -> String {
        if let Some(&index) = self.index_by_url.get(url) {
            return self.citations[index].marker.clone();
        }

        let index = self.citations.len();
        let marker = marker_for_index(index);
        let label = label.trim();
        self.citations.push(Citation {
            marker: marker.clone(),
            url: url.to_string(),
            label: if label.is_empty() {
                DEFAULT_LABEL.to_string()
            } else {
                label.to_string()
            },
        });
        self.index_by_url.insert(url.to_string(), index);
        marker
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    pub fn citations(&self) -> &[Citation] {
        &self.citations
    }

    pub fn into_citations(self) -> Vec<Citation> {
        self.citations
    }

    /// Render the citation block: `marker label` over `url`, one entry per
    /// citation in registration order, blank-line separated.
    pub fn render_block(&self) -> Option<String> {
        if self.citations.is_empty() {
            return None;
        }
        let entries: Vec<String> = self
            .citations
            .iter()
            .map(|citation| format!("{} {}\n{}", citation.marker, citation.label, citation.url))
            .collect();
        Some(entries.join("\n\n"))
    }
}

/// Replace `<a href="URL">label</a>` elements with citation markers.
pub fn extract_anchors(text: &str, registry: &mut CitationRegistry) -> String {
    ANCHOR_REGEX
        .replace_all(text, |caps: &regex::Captures<'_>| {
            registry.marker_for(&caps[1], &caps[2])
        })
        .into_owned()
}

/// Replace bare `http(s)://` tokens left after anchor extraction.
///
/// Trailing sentence punctuation and closing parens are not part of the URL;
/// they stay in the text after the marker.
pub fn extract_bare_urls(text: &str, registry: &mut CitationRegistry) -> String {
    BARE_URL_REGEX
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let matched = &caps[0];
            let url = matched.trim_end_matches(['.', ',', ';', ':', '!', '?', ')']);
            let trailing = &matched[url.len()..];
            format!("{}{}", registry.marker_for(url, ""), trailing)
        })
        .into_owned()
}
