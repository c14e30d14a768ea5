//! Markup cleanup passes applied after citation extraction.
//!
//! Each pass is a pure function; [`crate::format::normalize`] composes them
//! in a fixed order. Later passes assume anchors and bare URLs have already
//! been replaced by citation markers.

use regex::Regex;
use std::sync::LazyLock;

/// Indent prefix for list bullets: two em spaces.
const BULLET_INDENT: &str = "\u{2003}\u{2003}";

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[^>]+>").expect("hardcoded tag regex"));

static BULLET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[*-][ \t]+").expect("hardcoded bullet regex"));

static BOLD_STARS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*\n]+?)\*\*").expect("hardcoded bold regex"));

static ITALIC_STAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*\n]+?)\*").expect("hardcoded italic regex"));

static BOLD_UNDERSCORES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__([^_\n]+?)__").expect("hardcoded bold underscore regex"));

/// Guarded on both sides so snake_case identifiers survive.
static ITALIC_UNDERSCORE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(^|[\s(])_([^_\n]+?)_($|[\s).,;:!?])")
        .expect("hardcoded italic underscore regex")
});

static TRAILING_SPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+\n").expect("hardcoded trailing space regex"));

static EXCESS_NEWLINES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("hardcoded newline collapse regex"));

static MARKER_GROUP_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(\s*([¹²³⁴⁵⁶⁷⁸⁹⁰]+(?:\s*;\s*[¹²³⁴⁵⁶⁷⁸⁹⁰]+)*)\s*\)")
        .expect("hardcoded marker group regex")
});

/// Remove any angle-bracket tags left after anchor extraction.
pub fn strip_tags(text: &str) -> String {
    TAG_REGEX.replace_all(text, "").into_owned()
}

/// Turn `*`/`-` list bullets into indented bullet glyphs.
pub fn indent_bullets(text: &str) -> String {
    BULLET_REGEX
        .replace_all(text, format!("{BULLET_INDENT}• "))
        .into_owned()
}

/// Strip markdown emphasis wrappers, keeping the inner text.
///
/// Messenger renders raw emphasis markers inconsistently, so no emphasis
/// survives. Bold runs first; the single-marker passes would otherwise eat
/// half of a double marker.
pub fn strip_emphasis(text: &str) -> String {
    let text = BOLD_STARS_REGEX.replace_all(text, "${1}");
    let text = ITALIC_STAR_REGEX.replace_all(&text, "${1}");
    let text = BOLD_UNDERSCORES_REGEX.replace_all(&text, "${1}");
    ITALIC_UNDERSCORE_REGEX
        .replace_all(&text, "${1}${2}${3}")
        .into_owned()
}

/// Drop trailing spaces before newlines, collapse 3+ newlines to 2, trim.
pub fn clean_whitespace(text: &str) -> String {
    let text = TRAILING_SPACE_REGEX.replace_all(text, "\n");
    let text = EXCESS_NEWLINES_REGEX.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Unwrap parenthesized citation-marker groups: `(¹; ²)` becomes `¹ ²`.
pub fn ungroup_markers(text: &str) -> String {
    MARKER_GROUP_REGEX
        .replace_all(text, |caps: &regex::Captures<'_>| {
            caps[1]
                .split(';')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .into_owned()
}
