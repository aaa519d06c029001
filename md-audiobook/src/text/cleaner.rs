//! Chapter text assembly: markdown stripping, newline handling and cleanup.
//!
//! Every step is a plain `&str -> String` pass so each can be tested on its
//! own and the order is visible in one place.

use crate::error::ParseError;
use crate::text::replace::ReplaceRules;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

/// A total text transformation.
pub type TextPass = fn(&str) -> String;

/// Markdown passes in application order. Code blocks go first so their
/// contents never reach the emphasis passes.
pub const MARKDOWN_PASSES: &[TextPass] = &[
    strip_invisible,
    strip_code_blocks,
    strip_inline_code,
    strip_images,
    strip_links,
    strip_bold,
    strip_italic,
    strip_blockquotes,
    strip_bullets,
    strip_numbered_items,
    strip_heading_markers,
];

/// Characters that are invisible to a listener but confuse TTS engines.
const INVISIBLE_CHARS: &[(char, &str)] = &[
    ('\u{00a0}', " "), // Non-breaking space
    ('\u{200b}', ""),  // Zero-width space
    ('\u{200c}', ""),  // Zero-width non-joiner
    ('\u{200d}', ""),  // Zero-width joiner
    ('\u{feff}', ""),  // BOM
];

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern must compile")
}

static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| regex(r"(?s)```.*?```"));
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| regex(r"`([^`]*)`"));
static IMAGE: Lazy<Regex> = Lazy::new(|| regex(r"!\[([^\]]*)\]\([^)]*\)"));
static LINK: Lazy<Regex> = Lazy::new(|| regex(r"\[([^\]]+)\]\([^)]*\)"));
static BOLD_STARS: Lazy<Regex> = Lazy::new(|| regex(r"\*\*(.*?)\*\*"));
static BOLD_UNDERSCORES: Lazy<Regex> = Lazy::new(|| regex(r"__(.*?)__"));
static ITALIC_STAR: Lazy<Regex> = Lazy::new(|| regex(r"\*([^*\n]+)\*"));
static ITALIC_UNDERSCORE: Lazy<Regex> = Lazy::new(|| regex(r"\b_([^_\n]+)_\b"));
static BLOCKQUOTE: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^>+[ \t]?"));
static BULLET: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^[ \t]{0,3}[-*+][ \t]+"));
static NUMBERED: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^[ \t]*\d+\.[ \t]+"));
static HEADING_MARKER: Lazy<Regex> = Lazy::new(|| regex(r"(?m)^[ \t]*#{1,6}[ \t]*"));

static LINE_BREAKS: Lazy<Regex> = Lazy::new(|| regex(r"\n+"));
static PARAGRAPH_BREAKS: Lazy<Regex> = Lazy::new(|| regex(r"\n{2,}"));
static ENDNOTE: Lazy<Regex> = Lazy::new(|| regex(r#"([a-zA-Z.,!?;"”)])\d+"#));
static REFERENCE_NUMBER: Lazy<Regex> = Lazy::new(|| regex(r"\[\d+(\.\d+)?\]"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| regex(r"\s+"));

/// Drop control characters (other than line breaks and tabs) and zero-width
/// characters.
pub fn strip_invisible(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        if let Some((_, r)) = INVISIBLE_CHARS.iter().find(|(ch, _)| *ch == c) {
            result.push_str(r);
        } else if is_allowed_char(c) {
            result.push(c);
        }
    }
    result
}

fn is_allowed_char(c: char) -> bool {
    c == '\n' || c == '\t' || !c.is_control()
}

pub fn strip_code_blocks(text: &str) -> String {
    CODE_BLOCK.replace_all(text, "").into_owned()
}

pub fn strip_inline_code(text: &str) -> String {
    INLINE_CODE.replace_all(text, "$1").into_owned()
}

/// Images are read as their alt text.
pub fn strip_images(text: &str) -> String {
    IMAGE.replace_all(text, "$1").into_owned()
}

pub fn strip_links(text: &str) -> String {
    LINK.replace_all(text, "$1").into_owned()
}

pub fn strip_bold(text: &str) -> String {
    let text = BOLD_STARS.replace_all(text, "$1");
    BOLD_UNDERSCORES.replace_all(&text, "$1").into_owned()
}

/// Underscore emphasis only counts at word boundaries, so `snake_case`
/// identifiers survive.
pub fn strip_italic(text: &str) -> String {
    let text = ITALIC_STAR.replace_all(text, "$1");
    ITALIC_UNDERSCORE.replace_all(&text, "$1").into_owned()
}

pub fn strip_blockquotes(text: &str) -> String {
    BLOCKQUOTE.replace_all(text, "").into_owned()
}

pub fn strip_bullets(text: &str) -> String {
    BULLET.replace_all(text, "").into_owned()
}

pub fn strip_numbered_items(text: &str) -> String {
    NUMBERED.replace_all(text, "").into_owned()
}

pub fn strip_heading_markers(text: &str) -> String {
    HEADING_MARKER.replace_all(text, "").into_owned()
}

/// Run every markdown pass in order.
pub fn strip_markdown(text: &str) -> String {
    MARKDOWN_PASSES
        .iter()
        .fold(text.to_string(), |acc, pass| pass(&acc))
}

/// Remove digits glued to the end of a word or punctuation ("word12").
pub fn remove_endnotes(text: &str) -> String {
    ENDNOTE.replace_all(text, "$1").into_owned()
}

/// Remove bracketed reference numbers such as `[3]` or `[2.1]`.
pub fn remove_reference_numbers(text: &str) -> String {
    REFERENCE_NUMBER.replace_all(text, "").into_owned()
}

/// Collapse whitespace runs to one space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// How line breaks in the source become pauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewlineMode {
    /// Every line break is a paragraph break.
    Single,
    /// Only blank lines are paragraph breaks.
    #[default]
    Double,
    /// Line breaks are plain spaces.
    None,
}

impl NewlineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Double => "double",
            Self::None => "none",
        }
    }

    /// Replace line breaks according to this mode.
    pub fn apply(&self, text: &str, break_marker: &str) -> String {
        let text = text.replace("\r\n", "\n");
        let marker = format!(" {} ", break_marker.trim());
        match self {
            Self::Single => LINE_BREAKS.replace_all(&text, marker.as_str()).into_owned(),
            Self::Double => {
                let text = PARAGRAPH_BREAKS.replace_all(&text, marker.as_str());
                text.replace('\n', " ")
            }
            Self::None => text.replace('\n', " "),
        }
    }
}

impl fmt::Display for NewlineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NewlineMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "double" => Ok(Self::Double),
            "none" => Ok(Self::None),
            _ => Err(ParseError::InvalidNewlineMode(s.to_string())),
        }
    }
}

/// Settings that turn a heading plus raw body into narration text.
#[derive(Debug, Clone)]
pub struct TextCleanup {
    pub newline_mode: NewlineMode,
    pub break_marker: String,
    pub remove_endnotes: bool,
    pub remove_reference_numbers: bool,
    pub replacements: ReplaceRules,
}

impl Default for TextCleanup {
    fn default() -> Self {
        Self {
            newline_mode: NewlineMode::default(),
            break_marker: tts_client::DEFAULT_BREAK_MARKER.to_string(),
            remove_endnotes: false,
            remove_reference_numbers: false,
            replacements: ReplaceRules::default(),
        }
    }
}

impl TextCleanup {
    /// Build the final text of one chapter. Returns an empty string when
    /// nothing speakable is left.
    ///
    /// The heading is joined to the body with a single line break, so it only
    /// becomes its own paragraph in `single` mode.
    pub fn chapter_text(&self, heading: Option<&str>, body: &str) -> String {
        let parts: Vec<&str> = [heading.unwrap_or(""), body]
            .into_iter()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        if parts.is_empty() {
            return String::new();
        }

        let text = strip_markdown(&parts.join("\n"));
        let mut text = self.newline_mode.apply(&text, &self.break_marker);

        if self.remove_endnotes {
            text = remove_endnotes(&text);
        }
        if self.remove_reference_numbers {
            text = remove_reference_numbers(&text);
        }
        text = self.replacements.apply(&text);

        collapse_whitespace(&text)
    }
}
