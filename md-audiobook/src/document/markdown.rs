//! Markdown books: optional front matter, chapters split on `#`/`##` headings.

use super::{Chapter, Document, FallbackTitles};
use crate::error::ParseError;
use crate::text::TextCleanup;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static FRONT_MATTER_DELIMITER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^---\s*$").expect("built-in pattern must compile"));
static METADATA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z0-9_\- ]+):\s*(.+)$").expect("built-in pattern must compile")
});
static HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(#{1,6})\s+(.*)$").expect("built-in pattern must compile"));

/// Deepest heading level that starts a chapter.
const CHAPTER_HEADING_LEVEL: usize = 2;

const AUTHOR_KEYS: &[&str] = &["author", "authors", "creator"];

/// Lines between two chapter headings.
#[derive(Debug, Default)]
struct Section<'a> {
    heading: Option<&'a str>,
    lines: Vec<&'a str>,
}

impl Section<'_> {
    fn is_blank(&self) -> bool {
        self.heading.is_none() && self.lines.is_empty()
    }
}

/// Parse markdown content. `file_stem` is the last-resort book title.
pub fn parse_markdown(
    content: &str,
    file_stem: &str,
    cleanup: &TextCleanup,
    fallback: &mut FallbackTitles,
) -> Result<Document, ParseError> {
    let lines: Vec<&str> = content.lines().collect();
    let (metadata, body) = extract_front_matter(&lines)?;

    let title = book_title(&metadata, body, file_stem);
    let author = AUTHOR_KEYS
        .iter()
        .find_map(|key| metadata.get(*key))
        .cloned()
        .unwrap_or_else(|| "Unknown".to_string());

    let sections = split_sections(body);
    let has_headings = sections.iter().any(|s| s.heading.is_some());
    let mut chapters = Vec::new();

    if has_headings {
        for section in &sections {
            let text = cleanup.chapter_text(section.heading, &section.lines.join("\n"));
            if text.is_empty() {
                log::debug!("Dropping empty section {:?}", section.heading);
                continue;
            }
            chapters.push(Chapter::titled(
                section.heading,
                text,
                &cleanup.break_marker,
                fallback,
            ));
        }
    }

    // Headingless (or all-empty) documents become one chapter named after the book.
    if chapters.is_empty() && body.iter().any(|l| !l.trim().is_empty()) {
        let text = cleanup.chapter_text(Some(title.as_str()), &body.join("\n"));
        if !text.is_empty() {
            chapters.push(Chapter::titled(
                Some(title.as_str()),
                text,
                &cleanup.break_marker,
                fallback,
            ));
        }
    }

    Ok(Document {
        title,
        author,
        chapters,
    })
}

/// Split off a `---` delimited front matter block from line 1. Keys are
/// lowercased and the first occurrence of a key wins.
fn extract_front_matter<'a>(
    lines: &'a [&'a str],
) -> Result<(HashMap<String, String>, &'a [&'a str]), ParseError> {
    let mut metadata = HashMap::new();

    let Some(first) = lines.first() else {
        return Ok((metadata, lines));
    };
    if !FRONT_MATTER_DELIMITER.is_match(first) {
        return Ok((metadata, lines));
    }

    for (idx, line) in lines.iter().enumerate().skip(1) {
        if FRONT_MATTER_DELIMITER.is_match(line) {
            return Ok((metadata, &lines[idx + 1..]));
        }
        if let Some(caps) = METADATA.captures(line) {
            let key = caps[1].trim().to_lowercase();
            let value = caps[2].trim().to_string();
            metadata.entry(key).or_insert(value);
        }
    }

    Err(ParseError::UnterminatedFrontMatter)
}

/// Title precedence: front matter, first `#` heading, file name.
fn book_title(metadata: &HashMap<String, String>, body: &[&str], file_stem: &str) -> String {
    if let Some(title) = metadata.get("title") {
        return title.clone();
    }

    body.iter()
        .filter_map(|line| HEADING.captures(line))
        .find(|caps| caps[1].len() == 1)
        .map(|caps| caps[2].trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| file_stem.to_string())
}

/// Group body lines under the chapter heading that precedes them. Deeper
/// headings stay in the body.
fn split_sections<'a>(body: &[&'a str]) -> Vec<Section<'a>> {
    let mut sections = Vec::new();
    let mut current = Section::default();

    for &line in body {
        let chapter_heading = HEADING
            .captures(line)
            .filter(|caps| caps[1].len() <= CHAPTER_HEADING_LEVEL)
            .and_then(|caps| caps.get(2))
            .map(|m| m.as_str().trim());

        match chapter_heading {
            Some(heading) => {
                let finished = std::mem::take(&mut current);
                if !finished.is_blank() {
                    sections.push(finished);
                }
                current.heading = Some(heading);
            }
            None => current.lines.push(line),
        }
    }

    if !current.is_blank() {
        sections.push(current);
    }
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::{NewlineMode, ReplaceRules};

    const SAMPLE: &str = "---
title: Sample Markdown Adventure
author: Jane Doe
---

# Prologue

Welcome to the **journey**. Follow the [link](https://example.com).

A second paragraph.

## Chapter One

The hero sets out.
### A scene
Still chapter one.

## Chapter Two

- packs a bag
- leaves home
";

    fn parse(content: &str) -> Result<Document, ParseError> {
        parse_markdown(content, "sample", &TextCleanup::default(), &mut FallbackTitles::default())
    }

    #[test]
    fn test_sample_book() {
        let doc = parse(SAMPLE).unwrap();
        assert_eq!(doc.title, "Sample Markdown Adventure");
        assert_eq!(doc.author, "Jane Doe");

        let titles: Vec<&str> = doc.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Prologue", "Chapter_One", "Chapter_Two"]);

        let first = &doc.chapters[0].text;
        assert!(first.starts_with("Prologue"));
        assert!(first.contains("@BRK#"));
        assert!(!first.contains("**"));
        assert!(!first.contains("[link]"));
    }

    #[test]
    fn test_nested_headings_stay_in_chapter() {
        let doc = parse(SAMPLE).unwrap();
        assert_eq!(
            doc.chapters[1].text,
            "Chapter One The hero sets out. A scene Still chapter one."
        );
        assert_eq!(doc.chapters[2].text, "Chapter Two packs a bag leaves home");
    }

    #[test]
    fn test_two_chapter_example() {
        let doc = parse("---\ntitle: T\n---\n# Prologue\nHello.\n\n## One\nWorld **bold**.").unwrap();
        let chapters: Vec<(&str, &str)> = doc
            .chapters
            .iter()
            .map(|c| (c.title.as_str(), c.text.as_str()))
            .collect();
        assert_eq!(
            chapters,
            vec![("Prologue", "Prologue Hello."), ("One", "One World bold.")]
        );
    }

    #[test]
    fn test_no_headings_uses_book_title() {
        let doc = parse("---\ntitle: My Book\n---\nJust some text.\nMore text.").unwrap();
        assert_eq!(doc.chapters.len(), 1);
        assert_eq!(doc.chapters[0].title, "My_Book");
        assert_eq!(doc.chapters[0].text, "My Book Just some text. More text.");
    }

    #[test]
    fn test_no_headings_no_metadata_uses_file_stem() {
        let doc = parse("Plain text only.").unwrap();
        assert_eq!(doc.title, "sample");
        assert_eq!(doc.chapters.len(), 1);
        assert_eq!(doc.chapters[0].title, "sample");
    }

    #[test]
    fn test_preamble_gets_fallback_title() {
        let mut fallback = FallbackTitles::default();
        let doc = parse_markdown(
            "Before any heading.\n# Named\nBody.\n",
            "book",
            &TextCleanup::default(),
            &mut fallback,
        )
        .unwrap();
        let titles: Vec<&str> = doc.chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Chapter_1", "Named"]);
        assert_eq!(fallback.next_title(), "Chapter 2");
    }

    #[test]
    fn test_heading_only_chapter_is_kept() {
        let doc = parse("# Interlude\n# Next\nText.").unwrap();
        assert_eq!(doc.chapters.len(), 2);
        assert_eq!(doc.chapters[0].text, "Interlude");
    }

    #[test]
    fn test_empty_sections_are_dropped() {
        let doc = parse("# \n\n# Real\nContent.").unwrap();
        assert_eq!(doc.chapters.len(), 1);
        assert_eq!(doc.chapters[0].title, "Real");
    }

    #[test]
    fn test_front_matter_first_key_wins() {
        let doc = parse("---\nAuthor: First\nauthor: Second\n---\nText.").unwrap();
        assert_eq!(doc.author, "First");
    }

    #[test]
    fn test_author_precedence() {
        let doc = parse("---\ncreator: C\nauthors: B\n---\nText.").unwrap();
        assert_eq!(doc.author, "B");
    }

    #[test]
    fn test_unterminated_front_matter() {
        let result = parse("---\ntitle: Broken\n# Heading\nText.");
        assert!(matches!(result, Err(ParseError::UnterminatedFrontMatter)));
    }

    #[test]
    fn test_title_from_first_level_one_heading() {
        let doc = parse("## Sub\ntext\n# Main Title\nmore").unwrap();
        assert_eq!(doc.title, "Main Title");
    }

    #[test]
    fn test_empty_document() {
        let doc = parse("").unwrap();
        assert!(doc.chapters.is_empty());
        let doc = parse("---\ntitle: Only Meta\n---\n\n").unwrap();
        assert!(doc.chapters.is_empty());
    }

    #[test]
    fn test_newline_mode_none() {
        let cleanup = TextCleanup {
            newline_mode: NewlineMode::None,
            ..TextCleanup::default()
        };
        let doc = parse_markdown(
            "# A\none\n\ntwo",
            "x",
            &cleanup,
            &mut FallbackTitles::default(),
        )
        .unwrap();
        assert_eq!(doc.chapters[0].text, "A one two");
    }

    #[test]
    fn test_replacements_run_per_chapter() {
        let cleanup = TextCleanup {
            replacements: ReplaceRules::parse("colour==color").unwrap(),
            ..TextCleanup::default()
        };
        let doc = parse_markdown(
            "# A\nA colour.\n# B\nAnother colour.",
            "x",
            &cleanup,
            &mut FallbackTitles::default(),
        )
        .unwrap();
        assert_eq!(doc.chapters[0].text, "A A color.");
        assert_eq!(doc.chapters[1].text, "B Another color.");
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let first = parse(SAMPLE).unwrap();
        let second = parse(SAMPLE).unwrap();
        assert_eq!(first.chapters, second.chapters);
    }
}
