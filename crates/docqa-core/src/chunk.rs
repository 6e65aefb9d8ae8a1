//! Overlapping, boundary-aware text chunker.
//!
//! Splits document text into [`Chunk`]s of at most `max_chars` characters.
//! Consecutive chunks share exactly `overlap_chars` characters so that a
//! sentence straddling a cut is still seen whole by at least one chunk.
//!
//! # Algorithm
//!
//! 1. Text no longer than `max_chars` becomes a single chunk.
//! 2. Otherwise, look for a cut point inside the window
//!    `(start + overlap, start + max]`, preferring the latest position that
//!    follows a paragraph break (`\n\n`), then a line break, then a sentence
//!    end (`.`, `!`, `?` followed by whitespace), then any whitespace.
//! 3. With no boundary in the window, cut hard at `start + max`.
//! 4. The next chunk starts `overlap` characters before the cut.
//!
//! The lower bound of the window keeps every step moving forward, and the
//! fixed step-back makes the overlap exact. Offsets and lengths are in
//! Unicode scalar values, never bytes, so cuts never split a character.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::chunk::Chunker;
//!
//! let chunker = Chunker::new(2000, 200).unwrap();
//! let chunks = chunker.split("Hello world.\n\nSecond paragraph.");
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].index, 0);
//! assert!(chunker.split("").is_empty());
//! ```

use crate::error::{DocQaError, Result};
use crate::models::{sha256_hex, Chunk};

/// Default maximum chunk length in characters.
pub const DEFAULT_MAX_CHARS: usize = 2000;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_OVERLAP_CHARS: usize = 200;

/// Natural cut points, in order of preference.
#[derive(Debug, Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

impl Boundary {
    /// True when cutting before `chars[pos]` ends the chunk on this boundary.
    fn ends_at(self, chars: &[char], pos: usize) -> bool {
        let last = chars[pos - 1];
        match self {
            Boundary::Paragraph => pos >= 2 && last == '\n' && chars[pos - 2] == '\n',
            Boundary::Line => last == '\n',
            Boundary::Sentence => {
                pos >= 2 && last.is_whitespace() && matches!(chars[pos - 2], '.' | '!' | '?')
            }
            Boundary::Word => last.is_whitespace(),
        }
    }
}

/// Splits text into overlapping windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

impl Chunker {
    /// Create a chunker.
    ///
    /// # Errors
    ///
    /// Returns [`DocQaError::Configuration`] when `max_chars` is zero or the
    /// overlap is not strictly smaller than the maximum.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(DocQaError::Configuration(
                "chunking.max_chars must be > 0".to_string(),
            ));
        }
        if overlap_chars >= max_chars {
            return Err(DocQaError::Configuration(format!(
                "chunking.overlap_chars ({}) must be smaller than chunking.max_chars ({})",
                overlap_chars, max_chars
            )));
        }
        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    /// Split `text` into chunks with contiguous indices starting at 0.
    ///
    /// Empty input yields no chunks.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        // Byte offset of every character, plus the end of the string.
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = chars.len();

        let mut chunks = Vec::new();
        let mut start = 0usize;

        loop {
            let overlap = if chunks.is_empty() {
                0
            } else {
                self.overlap_chars
            };

            if total - start <= self.max_chars {
                chunks.push(make_chunk(text, &offsets, chunks.len(), start, total, overlap));
                break;
            }

            let end = find_cut(&chars, start + self.overlap_chars, start + self.max_chars);
            chunks.push(make_chunk(text, &offsets, chunks.len(), start, end, overlap));
            start = end - self.overlap_chars;
        }

        chunks
    }
}

/// Latest preferred cut in `(lo, hi]`, or `hi` when no boundary exists.
fn find_cut(chars: &[char], lo: usize, hi: usize) -> usize {
    for boundary in BOUNDARIES {
        if let Some(pos) = (lo + 1..=hi).rev().find(|&p| boundary.ends_at(chars, p)) {
            return pos;
        }
    }
    hi
}

fn make_chunk(
    text: &str,
    offsets: &[usize],
    index: usize,
    start: usize,
    end: usize,
    overlap: usize,
) -> Chunk {
    let slice = &text[offsets[start]..offsets[end]];
    Chunk {
        index,
        text: slice.to_string(),
        start,
        end,
        overlap,
        hash: sha256_hex(slice),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(chunks: &[Chunk]) -> String {
        let mut out = String::new();
        for c in chunks {
            out.extend(c.text.chars().skip(c.overlap));
        }
        out
    }

    fn sample_text() -> String {
        (0..120)
            .map(|i| {
                if i % 7 == 6 {
                    format!("Clause {} ends the section.\n\n", i)
                } else {
                    format!("Sentence number {} talks about uptime. ", i)
                }
            })
            .collect()
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = Chunker::default();
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunker = Chunker::default();
        let chunks = chunker.split("Hello, world!");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].overlap, 0);
    }

    #[test]
    fn test_chunks_respect_max_and_exact_overlap() {
        let text = sample_text();
        let chunker = Chunker::new(300, 40).unwrap();
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 5);

        for c in &chunks {
            assert!(c.char_len() <= 300, "chunk {} too long", c.index);
            assert_eq!(c.text.chars().count(), c.char_len());
        }
        for pair in chunks.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert_eq!(b.start, a.end - 40);
            assert_eq!(b.overlap, 40);
            let tail: String = a.text.chars().skip(a.char_len() - 40).collect();
            let head: String = b.text.chars().take(40).collect();
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_reconstruction_is_lossless() {
        let text = sample_text();
        for (max, overlap) in [(300, 40), (97, 13), (2000, 200), (50, 0)] {
            let chunks = Chunker::new(max, overlap).unwrap().split(&text);
            assert_eq!(reconstruct(&chunks), text, "max={} overlap={}", max, overlap);
        }
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let text = "First paragraph here.\n\nSecond paragraph is longer than the rest.";
        let chunks = Chunker::new(30, 5).unwrap().split(text);
        assert_eq!(chunks[0].text, "First paragraph here.\n\n");
    }

    #[test]
    fn test_prefers_sentence_over_word() {
        let text = "One two three. Four five six seven eight.";
        let chunks = Chunker::new(25, 3).unwrap().split(text);
        assert_eq!(chunks[0].text, "One two three. ");
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "abcdefghij".repeat(10);
        let chunks = Chunker::new(30, 10).unwrap().split(&text);
        assert_eq!(chunks[0].text.len(), 30);
        assert_eq!(chunks[1].start, 20);
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_multibyte_characters() {
        let text = "été à l'hôtel, ça coûte cher. ".repeat(20);
        let chunks = Chunker::new(40, 8).unwrap().split(&text);
        for c in &chunks {
            assert!(c.text.chars().count() <= 40);
        }
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_indices_contiguous_and_deterministic() {
        let text = sample_text();
        let chunker = Chunker::new(120, 20).unwrap();
        let c1 = chunker.split(&text);
        let c2 = chunker.split(&text);
        assert_eq!(c1, c2);
        for (i, c) in c1.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn test_rejects_invalid_sizes() {
        assert!(Chunker::new(0, 0).is_err());
        assert!(Chunker::new(100, 100).is_err());
        assert!(Chunker::new(100, 150).is_err());
        assert!(Chunker::new(100, 99).is_ok());
    }
}
