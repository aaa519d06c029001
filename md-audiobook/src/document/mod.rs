//! Turning a source document into an ordered list of chapters.

mod epub;
mod markdown;

pub use epub::TitleMode;
pub use markdown::parse_markdown;

use crate::error::ParseError;
use crate::text::TextCleanup;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// A parsed book.
#[derive(Debug, Clone)]
pub struct Document {
    pub title: String,
    pub author: String,
    /// Chapters in reading order
    pub chapters: Vec<Chapter>,
}

/// One unit of narration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// Filename-safe title, never empty
    pub title: String,
    /// Cleaned narration text, never empty
    pub text: String,
}

impl Chapter {
    /// Build a chapter, falling back to a numbered title when the source title
    /// is missing or has nothing filename-safe in it.
    fn titled(
        source_title: Option<&str>,
        text: String,
        break_marker: &str,
        fallback: &mut FallbackTitles,
    ) -> Self {
        let title = source_title
            .map(|t| sanitize_title(t, break_marker))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| sanitize_title(&fallback.next_title(), break_marker));
        Self { title, text }
    }
}

/// Counter for `Chapter {n}` titles. Only chapters that need a fallback
/// advance it.
#[derive(Debug, Default)]
pub struct FallbackTitles {
    issued: usize,
}

impl FallbackTitles {
    pub fn next_title(&mut self) -> String {
        self.issued += 1;
        format!("Chapter {}", self.issued)
    }
}

/// Declared format of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Markdown,
    Epub,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self, ParseError> {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "md" | "markdown" => Ok(Self::Markdown),
            "epub" => Ok(Self::Epub),
            _ => Err(ParseError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s]").expect("built-in pattern must compile"));
static SPACES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("built-in pattern must compile"));

/// Make a title safe for filenames: drop the break marker and punctuation,
/// then join words with underscores.
pub fn sanitize_title(title: &str, break_marker: &str) -> String {
    let marker = break_marker.trim();
    let title = if marker.is_empty() {
        title.to_string()
    } else {
        title.replace(marker, " ")
    };
    let title = NON_WORD.replace_all(&title, "");
    SPACES.replace_all(title.trim(), "_").into_owned()
}

/// Read and parse a document, picking the parser from the file extension.
/// `title_mode` only applies to EPUB; markdown chapters are titled by their
/// headings.
pub fn parse_document(
    path: &Path,
    cleanup: &TextCleanup,
    title_mode: TitleMode,
) -> Result<Document, ParseError> {
    let format = SourceFormat::from_path(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Untitled".to_string());
    let mut fallback = FallbackTitles::default();

    let document = match format {
        SourceFormat::Markdown => {
            let content = std::fs::read_to_string(path).map_err(|source| ParseError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            parse_markdown(&content, &stem, cleanup, &mut fallback)?
        }
        SourceFormat::Epub => epub::parse_epub(path, &stem, cleanup, title_mode, &mut fallback)?,
    };

    log::info!(
        "Parsed \"{}\" by {}: {} chapter(s)",
        document.title,
        document.author,
        document.chapters.len()
    );
    Ok(document)
}
