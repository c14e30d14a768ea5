//! Splitting long answers into Chatfuel-sized segments.

/// Chatfuel rejects messages much past this size, so it is the default bound.
pub const DEFAULT_SEGMENT_SIZE: usize = 1500;

/// Split `text` into ordered segments of at most `max_size` bytes,
/// preferring the last newline at or before the limit. A line longer than
/// the limit is cut mid-line. Segments are trimmed and never empty.
pub fn segment(text: &str, max_size: usize) -> Vec<String> {
    let max_size = max_size.max(1);
    let mut segments = Vec::new();
    let mut remaining = text.trim();

    while remaining.len() > max_size {
        // Walk back to a valid char boundary before slicing
        let mut cut = max_size;
        while !remaining.is_char_boundary(cut) {
            cut -= 1;
        }

        if let Some(newline) = remaining[..cut].rfind('\n') {
            cut = newline;
        }

        if cut == 0 {
            // First char alone exceeds the limit; emit it rather than spin.
            cut = remaining
                .char_indices()
                .nth(1)
                .map(|(offset, _)| offset)
                .unwrap_or(remaining.len());
        }

        let head = remaining[..cut].trim();
        if !head.is_empty() {
            segments.push(head.to_string());
        }
        remaining = remaining[cut..].trim_start();
    }

    if !remaining.is_empty() {
        segments.push(remaining.to_string());
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_a_single_segment() {
        assert_eq!(segment("hello", 1500), vec!["hello"]);
    }

    #[test]
    fn empty_text_yields_no_segments() {
        assert!(segment("", 1500).is_empty());
        assert!(segment("   \n  ", 1500).is_empty());
    }

    #[test]
    fn splits_at_the_last_newline_before_the_limit() {
        let text = "line one\nline two\nline three";
        let segments = segment(text, 20);

        assert_eq!(segments, vec!["line one\nline two", "line three"]);
        for s in &segments {
            assert!(s.len() <= 20);
        }
    }

    #[test]
    fn unbroken_text_is_cut_at_the_limit() {
        let text = "a".repeat(4000);
        let segments = segment(&text, 1500);

        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].len(), 1500);
        assert_eq!(segments[1].len(), 1500);
        assert_eq!(segments[2].len(), 1000);
    }

    #[test]
    fn no_segment_is_empty_and_content_is_preserved() {
        let text = "alpha\n\nbeta\n\ngamma delta\n\nepsilon";
        let segments = segment(text, 12);

        assert!(segments.iter().all(|s| !s.is_empty()));
        let rejoined = segments.join(" ");
        for word in ["alpha", "beta", "gamma", "delta", "epsilon"] {
            assert!(rejoined.contains(word));
        }
    }

    #[test]
    fn multibyte_text_is_never_cut_inside_a_char() {
        // Superscript markers are 2-3 bytes each; make sure cuts stay on
        // char boundaries.
        let text = "¹".repeat(2000);
        let segments = segment(&text, 1500);

        assert!(segments.len() >= 2);
        for s in &segments {
            assert!(s.len() <= 1500);
            assert!(s.chars().all(|c| c == '¹'));
        }
        let total: usize = segments.iter().map(|s| s.chars().count()).sum();
        assert_eq!(total, 2000);
    }

    #[test]
    fn tiny_limit_still_makes_progress() {
        let segments = segment("¹¹¹", 1);
        assert_eq!(segments.len(), 3);
    }
}
