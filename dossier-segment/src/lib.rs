pub mod text;

// Re-export the segmentation types for external use
pub use text::{DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP, SegmentError, TextChunk, TextSegmenter, normalize};
