//! User search-and-replace rules.
//!
//! A rule file holds one `pattern==replacement` pair per line. Lines starting
//! with `#`, lines starting or ending with `==`, and lines without `==` are
//! ignored. Replacements use `regex` syntax (`$1`, `${name}`).

use crate::error::ParseError;
use regex::Regex;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
struct ReplaceRule {
    pattern: Regex,
    replacement: String,
}

/// Ordered list of regex substitutions.
#[derive(Debug, Clone, Default)]
pub struct ReplaceRules {
    rules: Vec<ReplaceRule>,
}

impl ReplaceRules {
    /// Read and compile a rule file.
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let content = fs::read_to_string(path).map_err(|source| ParseError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let rules = Self::parse(&content)?;
        log::debug!("Loaded {} replacement rule(s) from {}", rules.len(), path.display());
        Ok(rules)
    }

    /// Compile rules from file content. A malformed pattern is an error.
    pub fn parse(content: &str) -> Result<Self, ParseError> {
        let mut rules = Vec::new();

        for line in content.lines() {
            if line.starts_with('#') || line.starts_with("==") || line.ends_with("==") {
                continue;
            }
            let Some((search, replacement)) = line.split_once("==") else {
                continue;
            };
            let pattern = Regex::new(search).map_err(|source| ParseError::InvalidRegex {
                pattern: search.to_string(),
                source,
            })?;
            rules.push(ReplaceRule {
                pattern,
                replacement: replacement.to_string(),
            });
        }

        Ok(Self { rules })
    }

    /// Apply every rule in file order.
    pub fn apply(&self, text: &str) -> String {
        self.rules.iter().fold(text.to_string(), |acc, rule| {
            rule.pattern
                .replace_all(&acc, rule.replacement.as_str())
                .into_owned()
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
