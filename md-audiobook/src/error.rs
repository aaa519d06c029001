//! Error kinds of the chapter pipeline.
//!
//! Parse errors are global and abort the run before any chapter is
//! dispatched. Chapter and assembly errors stay with the chapter that raised
//! them.

use std::path::PathBuf;
use thiserror::Error;
use tts_client::TtsError;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unsupported document format: {} (expected .md, .markdown or .epub)", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("Front matter opened on line 1 is never closed")]
    UnterminatedFrontMatter,

    #[error("Invalid newline mode: {0} (expected single, double or none)")]
    InvalidNewlineMode(String),

    #[error("Invalid title mode: {0} (expected auto, tag_text or first_few)")]
    InvalidTitleMode(String),

    #[error("Invalid search pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        source: regex::Error,
    },

    #[error("Failed to open EPUB: {0}")]
    Epub(String),
}

#[derive(Error, Debug)]
pub enum AssemblyError {
    #[error("No audio buffers to assemble")]
    Empty,

    #[error("Chunk sequence broken: expected chunk {expected}, found chunk {found}")]
    IndexGap { expected: usize, found: usize },

    #[error("Chunk count mismatch: buffers claim {expected} chunks, received {found}")]
    TotalMismatch { expected: usize, found: usize },

    #[error(
        "Chunk {chunk} has {found_rate} Hz/{found_channels} ch, expected {expected_rate} Hz/{expected_channels} ch"
    )]
    SpecMismatch {
        chunk: String,
        expected_rate: u32,
        expected_channels: u16,
        found_rate: u32,
        found_channels: u16,
    },

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ChapterError {
    #[error("Chunk {chunk_id} failed after {attempts} attempt(s): {source}")]
    Synthesis {
        chunk_id: String,
        attempts: u32,
        source: TtsError,
    },

    #[error("Assembly failed: {0}")]
    Assembly(#[from] AssemblyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker failed: {0}")]
    Worker(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesis_error_names_chunk() {
        let err = ChapterError::Synthesis {
            chunk_id: "chapter-2_Intro_chunk_3_of_5".into(),
            attempts: 4,
            source: TtsError::Network("reset".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("chapter-2_Intro_chunk_3_of_5"));
        assert!(msg.contains("4 attempt(s)"));
    }

    #[test]
    fn test_assembly_error_wraps_into_chapter_error() {
        let err: ChapterError = AssemblyError::IndexGap {
            expected: 2,
            found: 3,
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Assembly failed: Chunk sequence broken: expected chunk 2, found chunk 3"
        );
    }
}
