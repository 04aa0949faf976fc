//! Deterministic sliding-window segmentation of extracted document text.
//!
//! Uploaded records arrive as one flat string from the text-extraction layer.
//! Before a document can be indexed for retrieval it is normalized (newlines
//! collapsed to spaces, surrounding whitespace trimmed) and cut into
//! fixed-width windows that overlap by a configurable number of characters,
//! so that a sentence falling on a window boundary still appears whole in at
//! least one chunk.
//!
//! The two main types are:
//! - [`TextSegmenter`]: holds the validated window geometry and produces
//!   chunks from raw text.
//! - [`TextChunk`]: one window of normalized text together with its 0-based
//!   position in the document's chunk sequence.
//!
//! Segmentation is a pure function of its inputs: the same text and the same
//! geometry always yield the same chunk sequence, which is what makes a
//! persisted index reproducible.
//!
//! # Usage
//!
//! ```
//! use dossier_segment::text::TextSegmenter;
//!
//! let segmenter = TextSegmenter::new(8, 3).unwrap();
//! let chunks = segmenter.segment("AAAA BBBB CCCC DDDD");
//!
//! // 19 characters, window 8, stride 5 -> windows at 0, 5, 10, 15.
//! assert_eq!(chunks.len(), 4);
//! assert_eq!(chunks[0].text, "AAAA BBB");
//! assert_eq!(chunks[3].text, "DDDD");
//! assert_eq!(chunks[3].sequence, 3);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default window width in characters, matching the chunker defaults of the
/// original record-assistant deployment.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default overlap between consecutive windows, in characters.
pub const DEFAULT_OVERLAP: usize = 200;

/// Invalid window geometry. Construction fails fast so that a bad
/// configuration can never reach the windowing loop (an overlap as large as
/// the window would make the stride zero and the loop endless).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SegmentError {
    /// `chunk_size` was zero.
    #[error("chunk size must be greater than zero")]
    ZeroChunkSize,

    /// `overlap` was greater than or equal to `chunk_size`.
    #[error("overlap {overlap} must be smaller than chunk size {chunk_size}")]
    OverlapTooLarge { chunk_size: usize, overlap: usize },
}

/// One window of normalized document text.
///
/// Chunks are immutable once produced. `sequence` is the chunk's 0-based
/// position within its document and doubles as the deterministic tie-breaker
/// when two chunks score identically at query time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// 0-based position of this chunk within the document.
    pub sequence: usize,
    /// The normalized text covered by this window.
    pub text: String,
}

/// Splits normalized text into overlapping fixed-width windows.
///
/// For window width `S` and overlap `O`, chunk *i* starts at character
/// `i * (S - O)` of the normalized text and spans at most `S` characters;
/// the final chunk may be shorter. Consecutive chunks share exactly `O`
/// characters, and together the chunks cover the normalized text with no
/// gaps.
///
/// Offsets are counted in characters, not bytes, so multi-byte text never
/// splits inside a code point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSegmenter {
    chunk_size: usize,
    overlap: usize,
}

impl Default for TextSegmenter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl TextSegmenter {
    /// Creates a segmenter with the given window width and overlap.
    ///
    /// # Errors
    ///
    /// Returns [`SegmentError`] if `chunk_size` is zero or `overlap` is not
    /// strictly smaller than `chunk_size`.
    ///
    /// ```
    /// use dossier_segment::text::{SegmentError, TextSegmenter};
    ///
    /// assert!(TextSegmenter::new(1000, 200).is_ok());
    /// assert_eq!(
    ///     TextSegmenter::new(100, 100),
    ///     Err(SegmentError::OverlapTooLarge { chunk_size: 100, overlap: 100 })
    /// );
    /// ```
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self, SegmentError> {
        if chunk_size == 0 {
            return Err(SegmentError::ZeroChunkSize);
        }
        if overlap >= chunk_size {
            return Err(SegmentError::OverlapTooLarge {
                chunk_size,
                overlap,
            });
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Distance in characters between the starts of consecutive windows.
    pub fn stride(&self) -> usize {
        self.chunk_size - self.overlap
    }

    /// Normalizes `text` and splits it into overlapping windows.
    ///
    /// Empty text, or text that normalizes to empty, yields an empty
    /// sequence. Text shorter than the window width yields exactly one chunk
    /// holding the whole normalized text.
    pub fn segment(&self, text: &str) -> Vec<TextChunk> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Vec::new();
        }

        // Byte offset of every character boundary, including the end of the
        // string, so windows can be sliced without walking the text twice.
        let boundaries: Vec<usize> = normalized
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(normalized.len()))
            .collect();
        let char_len = boundaries.len() - 1;

        let mut chunks = Vec::with_capacity(char_len.div_ceil(self.stride()));
        let mut start = 0;
        while start < char_len {
            let end = (start + self.chunk_size).min(char_len);
            chunks.push(TextChunk {
                sequence: chunks.len(),
                text: normalized[boundaries[start]..boundaries[end]].to_string(),
            });
            start += self.stride();
        }
        chunks
    }
}

/// Collapses every newline character to a single space and trims surrounding
/// whitespace.
///
/// This is applied once, at index-build time. Queries are embedded raw; the
/// index and the query must agree on which side normalization happened, so
/// this function must never be applied to query text.
pub fn normalize(text: &str) -> String {
    text.replace(['\n', '\r'], " ").trim().to_string()
}
