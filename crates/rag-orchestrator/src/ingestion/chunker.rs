//! Text chunking with overlapping character windows

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::error::Result;
use crate::types::Chunk;

/// Splits document text into overlapping windows of at most `chunk_size`
/// characters.
///
/// Each window ends on the latest sentence boundary (or, failing that, word
/// boundary) found in its second half, and the next window starts `overlap`
/// characters before the previous one ended. Output depends only on the text
/// and the two parameters.
#[derive(Debug, Clone)]
pub struct Chunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Characters shared by consecutive chunks
    overlap: usize,
}

impl Chunker {
    /// Create a chunker, rejecting an overlap that is not smaller than the size
    pub fn new(config: &ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chunk_size: config.chunk_size,
            overlap: config.chunk_overlap,
        })
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split text into chunk contents. Blank text yields nothing.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let breaks = Breaks::scan(text, total);

        let mut pieces = Vec::new();
        let mut start = 0usize;

        loop {
            if total - start <= self.chunk_size {
                pieces.push(chars[start..].iter().collect());
                break;
            }

            let hard_end = start + self.chunk_size;
            // A chunk must be longer than the overlap or the next window
            // would not advance.
            let min_end = start + (self.overlap + 1).max(self.chunk_size / 2);
            let end = breaks.best_end(min_end, hard_end);

            pieces.push(chars[start..end].iter().collect());
            start = end - self.overlap;
        }

        pieces
    }

    /// Split text into chunks owned by `document_id`, indexed from zero
    pub fn chunk(&self, document_id: &str, text: &str) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(index, content)| Chunk::new(document_id, index as u32, content))
            .collect()
    }
}

/// Candidate chunk end positions, in character offsets
struct Breaks {
    /// A sentence starts at this offset
    sentence: Vec<bool>,
    /// The previous character is whitespace
    word: Vec<bool>,
}

impl Breaks {
    fn scan(text: &str, total: usize) -> Self {
        let mut sentence = vec![false; total + 1];
        let mut word = vec![false; total + 1];

        let mut sentence_starts = text
            .split_sentence_bound_indices()
            .map(|(byte, _)| byte)
            .peekable();

        for (offset, (byte, ch)) in text.char_indices().enumerate() {
            while sentence_starts.peek().is_some_and(|&b| b < byte) {
                sentence_starts.next();
            }
            if sentence_starts.peek() == Some(&byte) {
                sentence[offset] = true;
            }
            if ch.is_whitespace() {
                word[offset + 1] = true;
            }
        }

        Self { sentence, word }
    }

    /// Latest sentence boundary in `[min_end, max_end]`, then latest word
    /// boundary, then `max_end`
    fn best_end(&self, min_end: usize, max_end: usize) -> usize {
        let window = min_end..=max_end;
        window
            .clone()
            .rev()
            .find(|&i| self.sentence[i])
            .or_else(|| window.rev().find(|&i| self.word[i]))
            .unwrap_or(max_end)
    }
}
