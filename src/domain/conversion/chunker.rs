//! Size-bounded, boundary-respecting text chunking for synthesis requests.

use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum alphanumeric characters for a chunk to be worth synthesizing
pub const MIN_CHUNK_CHARS: usize = 3;

static PARAGRAPH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static SENTENCE_BOUNDARY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+").unwrap());

/// Chunk sizes are measured in characters, never bytes.
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// A chunk must carry some actual content to be worth a synthesis call.
pub fn is_valid_chunk(text: &str) -> bool {
    let stripped = text.trim();
    if stripped.is_empty() {
        return false;
    }
    stripped
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .count()
        >= MIN_CHUNK_CHARS
}

pub(crate) fn split_into_paragraphs(text: &str) -> Vec<&str> {
    PARAGRAPH_RE
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Split on sentence-ending punctuation followed by whitespace, keeping the
/// punctuation with its sentence.
pub(crate) fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut last_end = 0;

    for mat in SENTENCE_BOUNDARY_RE.find_iter(text) {
        let sentence = text[last_end..mat.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        last_end = mat.end();
    }

    let tail = text[last_end..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
}

/// Split text into chunks of at most `max_size` characters, preserving
/// paragraph and sentence boundaries where possible.
///
/// Paragraphs without enough alphanumeric content are dropped. A sentence
/// longer than `max_size` is hard-split into fixed-width slices; every other
/// chunk respects a natural boundary. Emission order follows reading order.
pub fn chunk_text(text: &str, max_size: usize) -> Vec<String> {
    let mut chunks = Vec::new();

    for paragraph in split_into_paragraphs(text) {
        if !is_valid_chunk(paragraph) {
            continue;
        }

        if char_len(paragraph) <= max_size {
            chunks.push(paragraph.to_string());
            continue;
        }

        // Paragraph too long, pack sentences greedily
        let mut current = String::new();
        for sentence in split_into_sentences(paragraph) {
            let sentence_len = char_len(&sentence);

            if sentence_len > max_size {
                // Sentence too long on its own: flush the buffer, then
                // hard-split the sentence into fixed-width slices
                if !current.is_empty() {
                    if is_valid_chunk(&current) {
                        chunks.push(std::mem::take(&mut current));
                    } else {
                        current.clear();
                    }
                }
                let chars: Vec<char> = sentence.chars().collect();
                for slice in chars.chunks(max_size) {
                    let part: String = slice.iter().collect();
                    if is_valid_chunk(&part) {
                        chunks.push(part);
                    }
                }
            } else if char_len(&current) + sentence_len + 1 <= max_size {
                if current.is_empty() {
                    current = sentence;
                } else {
                    current.push(' ');
                    current.push_str(&sentence);
                }
            } else {
                if is_valid_chunk(&current) {
                    chunks.push(std::mem::take(&mut current));
                }
                current = sentence;
            }
        }

        if !current.is_empty() && is_valid_chunk(&current) {
            chunks.push(current);
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("This is a short paragraph.", 100);
        assert_eq!(chunks, vec!["This is a short paragraph."]);
    }

    #[test]
    fn test_paragraphs_become_chunks() {
        let chunks = chunk_text("First paragraph here.\n\nSecond paragraph here.", 100);
        assert_eq!(
            chunks,
            vec!["First paragraph here.", "Second paragraph here."]
        );
    }

    #[test]
    fn test_drops_contentless_paragraphs() {
        let chunks = chunk_text("Real content here.\n\n...\n\n!!!", 100);
        assert_eq!(chunks, vec!["Real content here."]);
    }

    #[test]
    fn test_long_paragraph_splits_on_sentences() {
        let sentence = "This sentence has some words in it.";
        let paragraph = [sentence; 6].join(" ");
        let chunks = chunk_text(&paragraph, 80);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 80, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn test_every_chunk_within_bound() {
        let text = "Sentence one is here. Sentence two follows it! Does sentence three ask? Sentence four ends.";
        for max in [25, 40, 60] {
            for chunk in chunk_text(text, max) {
                assert!(chunk.chars().count() <= max);
            }
        }
    }

    #[test]
    fn test_oversized_sentence_hard_split() {
        let long_sentence = "a".repeat(250);
        let chunks = chunk_text(&long_sentence, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[1].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn test_hard_split_counts_chars_not_bytes() {
        // Multi-byte characters must not panic the fixed-width split
        let long_sentence = format!("abc {}", "é".repeat(150));
        let chunks = chunk_text(&long_sentence, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chars().count(), 100);
        // The remainder slice has no ASCII-alphanumeric content, so it is
        // filtered out
    }

    #[test]
    fn test_idempotent_on_valid_chunk() {
        let chunk = "Already a perfectly valid chunk of text.";
        assert_eq!(chunk_text(chunk, 100), vec![chunk.to_string()]);
    }

    #[test]
    fn test_order_preserved() {
        let sentences: Vec<String> = (1..=8)
            .map(|i| format!("This is sentence number {i}."))
            .collect();
        let text = sentences.join(" ");
        let chunks = chunk_text(&text, 60);

        let reassembled = chunks.join(" ");
        for sentence in &sentences {
            assert!(reassembled.contains(sentence.as_str()));
        }
        // Reading order must survive chunking
        let mut last_pos = 0;
        for sentence in &sentences {
            let pos = reassembled.find(sentence.as_str()).unwrap();
            assert!(pos >= last_pos);
            last_pos = pos;
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk_text("", 100).is_empty());
        assert!(chunk_text("   \n\n  ", 100).is_empty());
    }

    #[test]
    fn test_sentence_splitting() {
        let sentences = split_into_sentences("One. Two! Three? Four.");
        assert_eq!(sentences, vec!["One.", "Two!", "Three?", "Four."]);
    }

    #[test]
    fn test_validity_filter() {
        assert!(is_valid_chunk("abc"));
        assert!(is_valid_chunk("a1c"));
        assert!(!is_valid_chunk(""));
        assert!(!is_valid_chunk("  "));
        assert!(!is_valid_chunk(".."));
        assert!(!is_valid_chunk("a."));
    }
}
