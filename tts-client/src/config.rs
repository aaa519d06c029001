use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Voice parameters shared by every backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Voice name (OpenAI) or model file (Piper). None means the backend default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Model identifier for backends that have several
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Speaking rate multiplier
    #[serde(default = "default_speed")]
    pub speed: f32,

    /// Free-form style instructions for backends that accept them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Container of the finished chapter files. None means the backend default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,

    /// BCP-47 language tag of the text, used for chunk budgets
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_speed() -> f32 {
    1.0
}

fn default_language() -> String {
    "en-US".to_string()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice: None,
            model: None,
            speed: default_speed(),
            instructions: None,
            output_format: None,
            language: default_language(),
        }
    }
}

impl VoiceConfig {
    /// Languages written without spaces between words.
    pub fn is_cjk(&self) -> bool {
        is_cjk_language(&self.language)
    }
}

pub fn is_cjk_language(language: &str) -> bool {
    let language = language.to_lowercase();
    language.starts_with("zh") || language.starts_with("ja")
}

/// Provider-specific configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key (optional, can use env var instead)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Custom base URL (for API providers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Path to the engine binary (for subprocess providers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_path: Option<PathBuf>,

    /// Sample rate of raw PCM produced by local engines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,

    /// Break marker override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_marker: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_defaults() {
        let voice = VoiceConfig::default();
        assert_eq!(voice.speed, 1.0);
        assert_eq!(voice.language, "en-US");
        assert!(!voice.is_cjk());
    }

    #[test]
    fn test_cjk_detection() {
        assert!(is_cjk_language("zh-CN"));
        assert!(is_cjk_language("ZH-tw"));
        assert!(is_cjk_language("ja-JP"));
        assert!(!is_cjk_language("en-GB"));
    }

    #[test]
    fn test_parse_provider_config() {
        let toml_str = r#"
api_key = "sk-test"
base_url = "http://localhost:8080/v1"
"#;
        let config: ProviderConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:8080/v1"));
        assert!(config.binary_path.is_none());
    }
}
