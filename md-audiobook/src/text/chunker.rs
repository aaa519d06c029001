//! Splitting chapter text into backend-sized chunks.
//!
//! Chunks are cut greedily: each chunk takes as much text as the budget
//! allows, ending at the last paragraph or sentence boundary when one fits and
//! at the last word boundary otherwise. Only a single word longer than the
//! whole budget is ever cut mid-word.
//!
//! The paragraph break marker is never cut and never forms a chunk of its
//! own. It ends the previous chunk when it fits there, otherwise it opens the
//! next chunk together with at least the following word.

use super::Chunk;
use tts_client::is_cjk_language;

/// Characters that end a sentence.
const SENTENCE_ENDS: &[char] = &['.', '!', '?', ';', '。', '！', '？', '；', '…'];

/// Closing quotes and brackets that may follow a sentence end.
const CLOSERS: &[char] = &['"', '\'', '”', '’', ')', ']', '」', '』', '》', '）'];

/// Punctuation that must stay attached to the preceding character in
/// scripts without spaces.
const CJK_TRAILING: &[char] = &[
    '。', '，', '、', '？', '！', '：', '；', '”', '’', '）', '》', '】', '…', '—', '～', '」', '』',
    '〉', '〗', '〕',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreakClass {
    Char,
    Word,
    Sentence,
    Paragraph,
}

impl BreakClass {
    fn is_strong(self) -> bool {
        matches!(self, Self::Sentence | Self::Paragraph)
    }
}

/// A legal cut: the chunk ends before `end`, the next one starts at `next`.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    end: usize,
    next: usize,
    class: BreakClass,
}

/// Splits chapter text into chunks no longer than a character budget.
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    max_chars: usize,
    marker: Vec<char>,
    cjk: bool,
}

impl ChunkSplitter {
    /// Splitter for space-delimited text. A zero budget is treated as one.
    pub fn new(max_chars: usize, break_marker: &str) -> Self {
        Self {
            max_chars: max_chars.max(1),
            marker: break_marker.trim().chars().collect(),
            cjk: false,
        }
    }

    /// Splitter tuned for a language tag. Chinese and Japanese get half the
    /// budget and may be cut between any two characters.
    pub fn for_language(max_chars: usize, break_marker: &str, language: &str) -> Self {
        if is_cjk_language(language) {
            Self::new(max_chars / 2, break_marker).with_cjk(true)
        } else {
            Self::new(max_chars, break_marker)
        }
    }

    pub fn with_cjk(mut self, cjk: bool) -> Self {
        self.cjk = cjk;
        self
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    /// Split text into numbered chunks.
    pub fn chunks(&self, text: &str) -> Vec<Chunk> {
        let parts = self.split(text);
        let total = parts.len();
        parts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk::new(i + 1, total, text))
            .collect()
    }

    /// Split text into chunk strings.
    ///
    /// Whitespace is normalized first: runs collapse to one space, repeated
    /// break markers collapse to one, and markers at the very start or end of
    /// the text are dropped since they separate nothing. Unless a word had to
    /// be cut, the chunks joined with single spaces give back that normalized
    /// text, every remaining marker included.
    pub fn split(&self, text: &str) -> Vec<String> {
        let chars = self.normalize(text);

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < chars.len() {
            if chars.len() - start <= self.max_chars {
                push_chunk(&mut chunks, &chars[start..]);
                break;
            }

            let cut = self
                .best_cut(&chars, start)
                .unwrap_or_else(|| self.hard_cut(&chars, start));

            push_chunk(&mut chunks, &chars[start..cut.end]);
            start = cut.next;
        }

        chunks
    }

    fn normalize(&self, text: &str) -> Vec<char> {
        let mut tokens: Vec<&str> = Vec::new();
        for token in text.split_whitespace() {
            let repeated = self.is_marker_token(token)
                && tokens.last().is_some_and(|last| self.is_marker_token(last));
            if !repeated {
                tokens.push(token);
            }
        }

        let first = tokens
            .iter()
            .position(|t| !self.is_marker_token(t))
            .unwrap_or(tokens.len());
        let last = tokens
            .iter()
            .rposition(|t| !self.is_marker_token(t))
            .map_or(first, |i| i + 1);

        tokens[first..last].join(" ").chars().collect()
    }

    fn is_marker_token(&self, token: &str) -> bool {
        !self.marker.is_empty() && token.chars().eq(self.marker.iter().copied())
    }

    /// Whether the space-separated text holds nothing but break markers.
    fn only_markers(&self, chars: &[char]) -> bool {
        !self.marker.is_empty() && chars.split(|c| *c == ' ').all(|t| t == self.marker.as_slice())
    }

    /// Start of a marker occurrence that position `p` falls strictly inside.
    fn marker_containing(&self, chars: &[char], p: usize) -> Option<usize> {
        let m = self.marker.len();
        (1..m)
            .filter_map(|k| p.checked_sub(k))
            .find(|&s| s + m <= chars.len() && chars[s..s + m] == self.marker[..])
    }

    /// Last strong candidate within the budget, else the last weak one.
    fn best_cut(&self, chars: &[char], start: usize) -> Option<Candidate> {
        let limit = start + self.max_chars;
        let mut strong = None;
        let mut weak = None;

        for p in start + 1..=limit {
            let Some(candidate) = self.candidate_at(chars, start, p) else {
                continue;
            };
            if candidate.class.is_strong() {
                strong = Some(candidate);
            } else {
                weak = Some(candidate);
            }
        }

        strong.or(weak)
    }

    /// Cut at the budget for a word with no legal boundary in reach. Backs
    /// off to the start of a marker the budget would land inside.
    fn hard_cut(&self, chars: &[char], start: usize) -> Candidate {
        let mut end = start + self.max_chars;
        if let Some(s) = self.marker_containing(chars, end).filter(|&s| s > start) {
            end = s;
        }

        let mut next = end;
        while next < chars.len() && chars[next] == ' ' {
            next += 1;
        }
        while end > start && chars[end - 1] == ' ' {
            end -= 1;
        }

        Candidate {
            end,
            next,
            class: BreakClass::Char,
        }
    }

    fn candidate_at(&self, chars: &[char], start: usize, p: usize) -> Option<Candidate> {
        let current = chars[p];
        let previous = chars[p - 1];

        if self.marker_containing(chars, p).is_some() || self.only_markers(&chars[start..p]) {
            return None;
        }

        if current == ' ' {
            let class = self.classify(&chars[start..p]);
            return Some(Candidate {
                end: p,
                next: p + 1,
                class,
            });
        }

        if self.cjk && previous != ' ' && is_cjk_gap(previous, current) {
            let class = match self.classify(&chars[start..p]) {
                BreakClass::Word => BreakClass::Char,
                other => other,
            };
            return Some(Candidate {
                end: p,
                next: p,
                class,
            });
        }

        None
    }

    fn classify(&self, prefix: &[char]) -> BreakClass {
        if !self.marker.is_empty() && prefix.ends_with(&self.marker) {
            let before = prefix.len() - self.marker.len();
            if before == 0 || prefix[before - 1] == ' ' {
                return BreakClass::Paragraph;
            }
        }

        let last = prefix.iter().rev().find(|c| !CLOSERS.contains(c));
        match last {
            Some(c) if SENTENCE_ENDS.contains(c) => BreakClass::Sentence,
            _ => BreakClass::Word,
        }
    }
}

fn push_chunk(chunks: &mut Vec<String>, chars: &[char]) {
    if !chars.is_empty() {
        chunks.push(chars.iter().collect());
    }
}

/// Whether text may be cut between two adjacent non-space characters.
fn is_cjk_gap(previous: char, current: char) -> bool {
    let inside_ascii_word = previous.is_ascii_alphanumeric() && current.is_ascii_alphanumeric();
    let glued_punctuation = current.is_ascii_punctuation() || CJK_TRAILING.contains(&current);
    !inside_ascii_word && !glued_punctuation
}
