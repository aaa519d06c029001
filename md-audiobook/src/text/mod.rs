//! Text processing: cleanup, user replacements and chunking.

pub mod chunker;
pub mod cleaner;
pub mod replace;

pub use chunker::ChunkSplitter;
pub use cleaner::{NewlineMode, TextCleanup};
pub use replace::ReplaceRules;

use std::fmt;

/// A piece of chapter text sized for one backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 1-based position within the chapter
    pub index: usize,
    /// Number of chunks in the chapter
    pub total: usize,
    pub text: String,
}

impl Chunk {
    pub fn new(index: usize, total: usize, text: String) -> Self {
        Self { index, total, text }
    }
}

/// Stable name of one chunk of one chapter, used in logs and as the merge
/// key. The same chunk keeps its id across retries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkId {
    pub chapter_index: usize,
    pub chapter_title: String,
    pub index: usize,
    pub total: usize,
}

impl ChunkId {
    pub fn new(chapter_index: usize, chapter_title: &str, chunk: &Chunk) -> Self {
        Self {
            chapter_index,
            chapter_title: chapter_title.to_string(),
            index: chunk.index,
            total: chunk.total,
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chapter-{}_{}_chunk_{}_of_{}",
            self.chapter_index, self.chapter_title, self.index, self.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_creation() {
        let chunk = Chunk::new(1, 3, "Hello world".to_string());
        assert_eq!(chunk.index, 1);
        assert_eq!(chunk.total, 3);
        assert_eq!(chunk.text, "Hello world");
    }

    #[test]
    fn test_chunk_id_format() {
        let chunk = Chunk::new(2, 5, "text".to_string());
        let id = ChunkId::new(7, "Chapter_One", &chunk);
        assert_eq!(id.to_string(), "chapter-7_Chapter_One_chunk_2_of_5");
    }

    #[test]
    fn test_chunk_id_is_stable() {
        let chunk = Chunk::new(1, 1, "a".to_string());
        assert_eq!(ChunkId::new(1, "T", &chunk), ChunkId::new(1, "T", &chunk));
    }
}
