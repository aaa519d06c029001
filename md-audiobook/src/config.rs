//! md-audio configuration management.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tts_client::{ProviderConfig, VoiceConfig};

const DEFAULT_PROVIDER: &str = "openai";
const DEFAULT_NEWLINE_MODE: &str = "double";
const DEFAULT_TITLE_MODE: &str = "auto";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudiobookConfig {
    /// Synthesis backend (openai, piper)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// How line breaks become paragraph breaks (single, double, none)
    #[serde(default = "default_newline_mode")]
    pub newline_mode: String,

    /// Where EPUB chapter titles come from (auto, tag_text, first_few)
    #[serde(default = "default_title_mode")]
    pub title_mode: String,

    /// Paragraph break marker. None means the backend's own marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_marker: Option<String>,

    #[serde(default)]
    pub remove_endnotes: bool,

    #[serde(default)]
    pub remove_reference_numbers: bool,

    /// File of `pattern==replacement` lines applied to chapter text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_and_replace_file: Option<PathBuf>,

    /// Chapters synthesized in parallel
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Attempts per chunk, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base of the linear retry backoff
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,

    /// Concatenate mp3/aac chunks without re-encoding
    #[serde(default)]
    pub direct_merge: bool,

    #[serde(default)]
    pub voice: VoiceConfig,

    /// Per-provider settings, keyed by provider name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_provider() -> String {
    DEFAULT_PROVIDER.to_string()
}

fn default_newline_mode() -> String {
    DEFAULT_NEWLINE_MODE.to_string()
}

fn default_title_mode() -> String {
    DEFAULT_TITLE_MODE.to_string()
}

fn default_worker_count() -> usize {
    1
}

fn default_max_attempts() -> u32 {
    4
}

fn default_backoff_secs() -> u64 {
    2
}

impl Default for AudiobookConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            voice: VoiceConfig::default(),
            providers: HashMap::new(),
            newline_mode: default_newline_mode(),
            title_mode: default_title_mode(),
            break_marker: None,
            remove_endnotes: false,
            remove_reference_numbers: false,
            search_and_replace_file: None,
            worker_count: default_worker_count(),
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
            direct_merge: false,
        }
    }
}

impl AudiobookConfig {
    /// Get the config file path: ~/.config/cli-programs/md-audio.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".config").join("cli-programs").join("md-audio.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: AudiobookConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    pub fn provider_config(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}
