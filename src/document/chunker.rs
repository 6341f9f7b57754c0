//! Sentence-aligned text chunking with overlap.
use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Splits normalized text into sentences.
///
/// A boundary is whitespace preceded by `.`, `!` or `?` and followed by an
/// uppercase ASCII letter. Abbreviations shaped like `Mr.` or `e.g.` do not
/// end a sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() && ends_sentence(&chars, i) {
            let mut next = i;
            while next < chars.len() && chars[next].is_whitespace() {
                next += 1;
            }
            if next < chars.len() && chars[next].is_ascii_uppercase() {
                push_trimmed(&mut sentences, &chars[start..i]);
                start = next;
                i = next;
                continue;
            }
        }
        i += 1;
    }
    push_trimmed(&mut sentences, &chars[start..]);

    sentences
}

fn push_trimmed(out: &mut Vec<String>, chars: &[char]) {
    let s: String = chars.iter().collect();
    let s = s.trim();
    if !s.is_empty() {
        out.push(s.to_string());
    }
}

fn is_word(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Whether whitespace at `ws` follows sentence-ending punctuation that is not
/// part of an abbreviation.
fn ends_sentence(chars: &[char], ws: usize) -> bool {
    if ws == 0 || !matches!(chars[ws - 1], '.' | '!' | '?') {
        return false;
    }
    // "Mr. Smith", "Dr. Who"
    if ws >= 3
        && chars[ws - 1] == '.'
        && chars[ws - 3].is_ascii_uppercase()
        && chars[ws - 2].is_ascii_lowercase()
    {
        return false;
    }
    // "e.g. This", "U.S. Army"
    if ws >= 4 && is_word(chars[ws - 4]) && chars[ws - 3] == '.' && is_word(chars[ws - 2]) {
        return false;
    }
    true
}

/// Splits text into chunks of at most `chunk_size` characters, re-using up to
/// `overlap` characters of trailing sentences at the start of the next chunk.
///
/// A single sentence longer than `chunk_size` becomes a chunk on its own.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let normalized = WHITESPACE.replace_all(text.trim(), " ");
    let sentences = split_sentences(&normalized);
    let lens: Vec<usize> = sentences.iter().map(|s| s.chars().count()).collect();

    let mut chunks = Vec::new();
    let mut i = 0;

    while i < sentences.len() {
        let mut size = 0;
        let mut end = i;
        while end < sentences.len() {
            let addition = lens[end] + usize::from(end > i);
            if end > i && size + addition > chunk_size {
                break;
            }
            size += addition;
            end += 1;
        }

        chunks.push(sentences[i..end].join(" "));

        if end >= sentences.len() {
            break;
        }

        let mut overlap_size = 0;
        let mut overlap_count = 0;
        for k in (i..end).rev() {
            let len = lens[k] + usize::from(k < end - 1);
            if overlap_size + len > overlap {
                break;
            }
            overlap_size += len;
            overlap_count += 1;
        }

        i = (end - overlap_count).max(i + 1);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sentences_basic() {
        let s = split_sentences("First one. Second one! Third one? fourth stays.");
        assert_eq!(
            s,
            vec!["First one.", "Second one!", "Third one? fourth stays."]
        );
    }

    #[test]
    fn test_split_sentences_abbreviations() {
        let s = split_sentences("Ask Mr. Smith about it. Use tools e.g. Claude works. Done.");
        assert_eq!(
            s,
            vec!["Ask Mr. Smith about it.", "Use tools e.g. Claude works.", "Done."]
        );
    }

    #[test]
    fn test_chunk_short_text_single_chunk() {
        let chunks = chunk_text("One sentence. Another sentence.", 800, 100);
        assert_eq!(chunks, vec!["One sentence. Another sentence."]);
    }

    #[test]
    fn test_chunk_empty_text() {
        assert!(chunk_text("", 800, 100).is_empty());
        assert!(chunk_text("   \n\n  ", 800, 100).is_empty());
    }

    #[test]
    fn test_chunk_normalizes_whitespace() {
        let chunks = chunk_text("Line one\n\nwraps   here.\tNext line.", 800, 0);
        assert_eq!(chunks, vec!["Line one wraps here. Next line."]);
    }

    #[test]
    fn test_chunks_respect_size() {
        let text = "This is a sentence of moderate length. ".repeat(60);
        let chunks = chunk_text(&text, 200, 50);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 200, "chunk too long: {chunk}");
        }
    }

    #[test]
    fn test_chunks_overlap_previous_sentence() {
        let text = "Alpha sentence here. Bravo sentence here. Gamma sentence here. Delta sentence here.";
        // Each sentence is 20 chars; two fit in 41, overlap fits one sentence.
        let chunks = chunk_text(text, 41, 20);
        assert_eq!(chunks[0], "Alpha sentence here. Bravo sentence here.");
        assert_eq!(chunks[1], "Bravo sentence here. Gamma sentence here.");
        assert_eq!(chunks[2], "Gamma sentence here. Delta sentence here.");
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_chunks_no_overlap() {
        let text = "Alpha sentence here. Bravo sentence here. Charlie sentence here.";
        let chunks = chunk_text(text, 41, 0);
        assert_eq!(
            chunks,
            vec![
                "Alpha sentence here. Bravo sentence here.",
                "Charlie sentence here."
            ]
        );
    }

    #[test]
    fn test_oversized_sentence_kept_whole() {
        let long = format!("Word {}.", "word ".repeat(100).trim());
        let text = format!("Short start. {long} Short end.");
        let chunks = chunk_text(&text, 50, 10);
        assert!(chunks.iter().any(|c| c == &long));
        assert_eq!(chunks.last().unwrap(), "Short end.");
    }

    #[test]
    fn test_chunk_unicode_counts_chars() {
        let text = "Ça va bien. Naïve idée ici. Très bon.";
        let chunks = chunk_text(text, 27, 0);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "Ça va bien. Naïve idée ici.");
        assert_eq!(chunks[0].chars().count(), 27);
    }
}
