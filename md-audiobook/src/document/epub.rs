// EPUB parsing: one candidate chapter per spine item

use super::{Chapter, Document, FallbackTitles};
use crate::error::ParseError;
use crate::text::TextCleanup;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Width handed to html2text; wide enough that paragraphs are never wrapped.
const RENDER_WIDTH: usize = 1000;

/// Length of a title taken from the chapter's opening text.
const FIRST_FEW_CHARS: usize = 60;

fn tag(name: &str) -> Regex {
    Regex::new(&format!(r"(?is)<{name}[^>]*>(.*?)</{name}>")).expect("built-in pattern must compile")
}

static TITLE: Lazy<Regex> = Lazy::new(|| tag("title"));
static H1: Lazy<Regex> = Lazy::new(|| tag("h1"));
static H2: Lazy<Regex> = Lazy::new(|| tag("h2"));
static H3: Lazy<Regex> = Lazy::new(|| tag("h3"));
static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("built-in pattern must compile"));

/// Where EPUB chapter titles come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TitleMode {
    /// The chapter's heading, else its opening words.
    #[default]
    Auto,
    /// `<title>`, then the first `<h1>` to `<h3>`.
    TagText,
    /// The first 60 characters of the chapter text.
    FirstFew,
}

impl TitleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::TagText => "tag_text",
            Self::FirstFew => "first_few",
        }
    }

    /// Raw title for one spine item. None leaves the numbered fallback.
    fn chapter_title(&self, html: &str, text: &str, break_marker: &str) -> Option<String> {
        match self {
            Self::Auto => {
                tag_title(html, &[&*H1, &*H2, &*H3]).or_else(|| first_few(text, break_marker))
            }
            Self::TagText => tag_title(html, &[&*TITLE, &*H1, &*H2, &*H3]),
            Self::FirstFew => first_few(text, break_marker),
        }
    }
}

impl fmt::Display for TitleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TitleMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "auto" => Ok(Self::Auto),
            "tag_text" => Ok(Self::TagText),
            "first_few" => Ok(Self::FirstFew),
            _ => Err(ParseError::InvalidTitleMode(s.to_string())),
        }
    }
}

/// Parse an EPUB file into chapters in spine order.
pub fn parse_epub(
    path: &Path,
    file_stem: &str,
    cleanup: &TextCleanup,
    title_mode: TitleMode,
    fallback: &mut FallbackTitles,
) -> Result<Document, ParseError> {
    let mut doc =
        ::epub::doc::EpubDoc::new(path).map_err(|e| ParseError::Epub(e.to_string()))?;

    let title = doc
        .mdata("title")
        .map(|m| m.value.clone())
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| file_stem.to_string());
    let author = doc
        .mdata("creator")
        .map(|m| m.value.clone())
        .filter(|a| !a.trim().is_empty())
        .unwrap_or_else(|| "Unknown".to_string());

    let mut chapters = Vec::new();
    let spine = doc.spine.clone();

    for spine_item in spine.iter() {
        let Some((content_bytes, _mime)) = doc.get_resource(&spine_item.idref) else {
            log::warn!("Spine item {} has no resource, skipping", spine_item.idref);
            continue;
        };
        let html = String::from_utf8_lossy(&content_bytes);

        let text = cleanup.chapter_text(None, &html_to_text(&html));
        if text.is_empty() {
            log::debug!("Skipping empty spine item {}", spine_item.idref);
            continue;
        }

        let heading = title_mode.chapter_title(&html, &text, &cleanup.break_marker);
        chapters.push(Chapter::titled(
            heading.as_deref(),
            text,
            &cleanup.break_marker,
            fallback,
        ));
    }

    Ok(Document {
        title,
        author,
        chapters,
    })
}

/// Text of the first non-empty match of the first tag that has one.
fn tag_title(html: &str, tags: &[&Regex]) -> Option<String> {
    tags.iter().find_map(|tag| {
        tag.captures_iter(html)
            .map(|caps| strip_html_tags(&caps[1]))
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .find(|t| !t.is_empty())
    })
}

/// Opening characters of the chapter text, break markers left out.
fn first_few(text: &str, break_marker: &str) -> Option<String> {
    let marker = break_marker.trim();
    let words: Vec<&str> = text
        .split_whitespace()
        .filter(|w| marker.is_empty() || *w != marker)
        .collect();
    let title: String = words.join(" ").chars().take(FIRST_FEW_CHARS).collect();
    let title = title.trim_end();
    (!title.is_empty()).then(|| title.to_string())
}

fn strip_html_tags(html: &str) -> String {
    TAG.replace_all(html, "").into_owned()
}

/// Render HTML as plain text with one blank line between paragraphs.
fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), RENDER_WIDTH);
    normalize_lines(&text)
}

/// Trim every line and squeeze runs of blank lines into one.
fn normalize_lines(text: &str) -> String {
    let mut result = String::new();
    let mut blank_pending = false;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            blank_pending = !result.is_empty();
            continue;
        }
        if !result.is_empty() {
            result.push_str(if blank_pending { "\n\n" } else { "\n" });
        }
        blank_pending = false;
        result.push_str(trimmed);
    }

    result
}
