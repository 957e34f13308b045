//! Fenced code block extraction.
//!
//! A block is the text between a prefix marker and the first suffix marker that
//! follows it. Extraction is purely positional: no markdown parsing, no
//! language detection beyond what the prefix marker itself encodes.

/// Split `content` on every occurrence of `prefix`, dropping empty fragments.
///
/// The text before the first prefix is a fragment too, which matches how the
/// reply hook has always treated leading prose.
pub fn split_fragments<'a>(content: &'a str, prefix: &str) -> Vec<&'a str> {
    if prefix.is_empty() {
        return if content.is_empty() {
            Vec::new()
        } else {
            vec![content]
        };
    }

    content
        .split(prefix)
        .filter(|fragment| !fragment.is_empty())
        .collect()
}

/// Body of one fragment: text before the first `suffix`, trimmed.
///
/// Returns `None` when the fragment is unterminated or the body is blank.
pub fn block_body<'a>(fragment: &'a str, suffix: &str) -> Option<&'a str> {
    let end = fragment.find(suffix)?;
    let body = fragment[..end].trim();
    if body.is_empty() { None } else { Some(body) }
}

/// All complete, non-blank code blocks in encounter order.
pub fn extract_code_blocks<'a>(content: &'a str, prefix: &str, suffix: &str) -> Vec<&'a str> {
    split_fragments(content, prefix)
        .into_iter()
        .filter_map(|fragment| block_body(fragment, suffix))
        .collect()
}

/// Cut `text` to at most `max` characters.
///
/// Counts Unicode scalar values, so the cut can never land inside a UTF-8
/// sequence. Grapheme clusters and word boundaries are not respected.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
