//! Chunk validation and repair.
//!
//! Every chunk handed to synthesis must be speakable and size-bounded. Rather
//! than dropping fragments that fail the speakability predicate outright,
//! the repair pass merges them into neighboring content where that salvages
//! them, and re-splits anything the merging pushed over the size ceiling.

use super::chunker::{char_len, split_into_sentences};
use super::error::ConversionError;

/// Minimum alphanumeric characters for a speakable chunk
const MIN_SPEAKABLE_CHARS: usize = 3;
/// Minimum alphabetic characters, rejecting pure-number/punctuation fragments
const MIN_READABLE_LETTERS: usize = 2;

/// Why a fragment fails the speakability predicate, if it does.
fn rejection_reason(text: &str) -> Option<&'static str> {
    let stripped = text.trim();
    if stripped.is_empty() {
        return Some("is empty");
    }
    let alphanumeric = stripped
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .count();
    if alphanumeric < MIN_SPEAKABLE_CHARS {
        return Some("has insufficient speakable content");
    }
    let letters = stripped.chars().filter(char::is_ascii_alphabetic).count();
    if letters < MIN_READABLE_LETTERS {
        return Some("has no readable words");
    }
    None
}

pub fn is_speakable(text: &str) -> bool {
    rejection_reason(text).is_none()
}

fn describe_rejection(text: &str, reason: &str) -> String {
    let preview: String = text.trim().chars().take(50).collect();
    format!("fragment {reason}: '{preview}'")
}

/// Re-pack an over-long chunk by sentence up to `max_size`. Full pieces are
/// returned for emission; the undersized tail comes back separately so it can
/// keep absorbing later fragments instead of being emitted too small.
fn repack_sentences(text: &str, max_size: usize) -> (Vec<String>, Option<String>) {
    let mut packed = Vec::new();
    let mut current = String::new();

    for sentence in split_into_sentences(text) {
        let sentence_len = char_len(&sentence);

        if sentence_len > max_size {
            if !current.is_empty() {
                if is_speakable(&current) {
                    packed.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
            let chars: Vec<char> = sentence.chars().collect();
            for slice in chars.chunks(max_size) {
                let part: String = slice.iter().collect();
                if char_len(&part) == max_size {
                    packed.push(part);
                } else {
                    // Undersized final slice keeps packing
                    current = part;
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
            if is_speakable(&current) {
                packed.push(std::mem::take(&mut current));
            }
            current = sentence;
        }
    }

    let leftover = if current.is_empty() {
        None
    } else {
        Some(current)
    };
    (packed, leftover)
}

/// Repair a chunk sequence so every surviving chunk is speakable and at most
/// `max_size` characters.
///
/// A single pending buffer walks the sequence: invalid fragments merge into
/// it (or are dropped when nothing precedes them), valid chunks merge with it
/// while the combination fits, and over-long results are re-split by sentence
/// with the undersized tail re-entering the buffer. Fails when nothing
/// speakable survives, naming the offending fragments.
pub fn repair_chunks(
    chunks: Vec<String>,
    max_size: usize,
) -> Result<Vec<String>, ConversionError> {
    let mut repaired: Vec<String> = Vec::new();
    let mut pending: Option<String> = None;
    let mut reasons: Vec<String> = Vec::new();

    for chunk in &chunks {
        let chunk = chunk.trim();

        if let Some(reason) = rejection_reason(chunk) {
            match pending.as_mut() {
                Some(buffer) => {
                    buffer.push(' ');
                    buffer.push_str(chunk);
                }
                None => reasons.push(describe_rejection(chunk, reason)),
            }
            continue;
        }

        let candidate = match pending.take() {
            Some(buffer) if char_len(&buffer) + 1 + char_len(chunk) <= max_size => {
                format!("{buffer} {chunk}")
            }
            Some(buffer) => {
                match rejection_reason(&buffer) {
                    None => repaired.push(buffer),
                    Some(reason) => reasons.push(describe_rejection(&buffer, reason)),
                }
                chunk.to_string()
            }
            None => chunk.to_string(),
        };

        if char_len(&candidate) > max_size {
            let (mut packed, leftover) = repack_sentences(&candidate, max_size);
            repaired.append(&mut packed);
            pending = leftover;
        } else {
            pending = Some(candidate);
        }
    }

    if let Some(buffer) = pending {
        match rejection_reason(&buffer) {
            None => repaired.push(buffer),
            Some(reason) => reasons.push(describe_rejection(&buffer, reason)),
        }
    }

    // Final filter: anything still unspeakable is dropped
    repaired.retain(|chunk| is_speakable(chunk));

    if repaired.is_empty() {
        let mut summary = reasons;
        if summary.is_empty() {
            summary.push("no chunks were produced".to_string());
        }
        summary.truncate(5);
        return Err(ConversionError::Validation(summary.join("; ")));
    }

    Ok(repaired)
}
