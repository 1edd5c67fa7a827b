//! Sliding-window text chunker.
//!
//! Page text is whitespace-normalized (every run of whitespace becomes one
//! space) and cut into windows of at most `max_chars` characters. Each
//! window starts `max_chars - overlap_chars` characters after the previous
//! one, and the final window ends exactly at the end of the text, so every
//! character lands in at least one chunk.
//!
//! Lengths are counted in Unicode scalar values; a window never splits a
//! code point.

use crate::error::{RagError, Result};

/// Default window size in characters.
pub const DEFAULT_MAX_CHARS: usize = 1200;
/// Default overlap between consecutive windows in characters.
pub const DEFAULT_OVERLAP_CHARS: usize = 200;

/// Validated window parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    max_chars: usize,
    overlap_chars: usize,
}

impl ChunkWindow {
    /// Validate window parameters.
    ///
    /// `overlap_chars >= max_chars` would never advance the window, so it is
    /// rejected up front as a configuration error.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self> {
        if max_chars == 0 {
            return Err(RagError::Configuration(
                "chunking.max_chars must be > 0".to_string(),
            ));
        }
        if overlap_chars >= max_chars {
            return Err(RagError::Configuration(format!(
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

    fn step(&self) -> usize {
        self.max_chars - self.overlap_chars
    }

    /// Split `text` into overlapping windows.
    ///
    /// Returns an empty vector for empty or whitespace-only input.
    pub fn split(&self, text: &str) -> Vec<String> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, plus the end of the string.
        let bounds: Vec<usize> = normalized
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(normalized.len()))
            .collect();
        let char_len = bounds.len() - 1;

        let mut chunks = Vec::with_capacity(char_len / self.step() + 1);
        let mut start = 0usize;
        loop {
            let end = (start + self.max_chars).min(char_len);
            chunks.push(normalized[bounds[start]..bounds[end]].to_string());
            if end == char_len {
                break;
            }
            start = end - self.overlap_chars;
        }
        chunks
    }
}

impl Default for ChunkWindow {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_MAX_CHARS,
            overlap_chars: DEFAULT_OVERLAP_CHARS,
        }
    }
}

/// Split `text` with explicit window parameters.
///
/// Convenience wrapper over [`ChunkWindow::new`] + [`ChunkWindow::split`].
pub fn chunk_text(text: &str, max_chars: usize, overlap_chars: usize) -> Result<Vec<String>> {
    Ok(ChunkWindow::new(max_chars, overlap_chars)?.split(text))
}

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
