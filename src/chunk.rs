//! Paragraph-boundary passage chunker.
//!
//! Splits one dataset row into [`Passage`]s that respect a `max_tokens`
//! limit. Splitting happens on paragraph boundaries (`\n\n`) first; a
//! paragraph longer than the limit is hard-split at the last space before
//! the boundary.
//!
//! Passage ids are UUIDv5 values derived from the title and chunk index, so
//! rebuilding the same corpus yields the same ids.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::Passage;

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split `text` into passages with contiguous indices starting at 0.
///
/// Blank text yields no passages.
pub fn chunk_text(title: &str, text: &str, max_tokens: usize) -> Vec<Passage> {
    let max_chars = max_tokens.max(1) * CHARS_PER_TOKEN;
    let mut passages = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current.is_empty() {
            trimmed.len()
        } else {
            current.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current.is_empty() {
            push_passage(&mut passages, title, &current);
            current.clear();
        }

        if trimmed.len() > max_chars {
            let mut remaining = trimmed;
            while !remaining.is_empty() {
                let split_at = floor_char_boundary(remaining, max_chars);
                let actual = if split_at < remaining.len() {
                    remaining[..split_at]
                        .rfind(char::is_whitespace)
                        .filter(|&pos| pos > 0)
                        .map(|pos| pos + 1)
                        .unwrap_or(split_at)
                } else {
                    split_at
                };
                let piece = remaining[..actual].trim();
                if !piece.is_empty() {
                    push_passage(&mut passages, title, piece);
                }
                remaining = &remaining[actual..];
            }
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(trimmed);
        }
    }

    if !current.is_empty() {
        push_passage(&mut passages, title, &current);
    }

    passages
}

/// Largest byte index `<= max` that lies on a char boundary (never 0 for
/// non-empty input, so splitting always makes progress).
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut idx = max;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    if idx == 0 {
        s.chars().next().map(char::len_utf8).unwrap_or(s.len())
    } else {
        idx
    }
}

fn push_passage(passages: &mut Vec<Passage>, title: &str, text: &str) {
    let index = passages.len();
    passages.push(make_passage(title, index, text));
}

fn make_passage(title: &str, index: usize, text: &str) -> Passage {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let key = format!("{}#{}", title, index);
    Passage {
        id: Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes()).to_string(),
        title: title.to_string(),
        chunk_index: index,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_single_passage() {
        let passages = chunk_text("Genesis", "In the beginning", 700);
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].chunk_index, 0);
        assert_eq!(passages[0].title, "Genesis");
        assert_eq!(passages[0].text, "In the beginning");
    }

    #[test]
    fn test_blank_text_has_no_passages() {
        assert!(chunk_text("Genesis", "", 700).is_empty());
        assert!(chunk_text("Genesis", "  \n\n \n\n", 700).is_empty());
    }

    #[test]
    fn test_paragraphs_exceeding_limit_split() {
        // max_tokens=5 => max_chars=20
        let text = "This is paragraph one\n\nThis is paragraph two\n\nThis is paragraph three";
        let passages = chunk_text("Psalms", text, 5);
        assert!(passages.len() > 1);
        for (i, p) in passages.iter().enumerate() {
            assert_eq!(p.chunk_index, i);
        }
    }

    #[test]
    fn test_long_paragraph_hard_split() {
        let text = "word ".repeat(100);
        let passages = chunk_text("Psalms", &text, 5);
        assert!(passages.len() > 1);
        for p in &passages {
            assert!(p.text.len() <= 20, "passage too long: {:?}", p.text);
            assert!(!p.text.is_empty());
        }
    }

    #[test]
    fn test_ids_deterministic_and_distinct() {
        let text = "Alpha\n\nBeta\n\nGamma\n\nDelta";
        let a = chunk_text("Genesis", text, 2);
        let b = chunk_text("Genesis", text, 2);
        assert_eq!(a, b);
        assert_ne!(a[0].id, a[1].id);

        let other = chunk_text("Exodus", text, 2);
        assert_ne!(a[0].id, other[0].id);
    }
}
