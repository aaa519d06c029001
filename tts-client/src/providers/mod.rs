//! Synthesis backend implementations

pub mod mock;
mod openai;
mod piper;

pub use mock::MockBackend;
pub use openai::OpenAiProvider;
pub use piper::PiperProvider;

use std::str::FromStr;

use crate::backend::SynthesisBackend;
use crate::config::{ProviderConfig, VoiceConfig};
use crate::error::{Result, TtsError};

/// Supported backend types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OpenAi,
    Piper,
}

impl FromStr for BackendKind {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "piper" => Ok(Self::Piper),
            _ => Err(TtsError::Config(format!("Unknown provider: {}", s))),
        }
    }
}

impl BackendKind {
    /// Name used as the key of `[providers.<name>]` tables
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Piper => "piper",
        }
    }

    /// Get the environment variable name for this backend's API key
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Piper => None,
        }
    }
}

/// Create a backend instance and validate its configuration
pub fn create_backend(
    kind: BackendKind,
    voice: &VoiceConfig,
    provider_config: Option<&ProviderConfig>,
) -> Result<Box<dyn SynthesisBackend>> {
    let marker = provider_config.and_then(|c| c.break_marker.clone());

    let backend: Box<dyn SynthesisBackend> = match kind {
        BackendKind::OpenAi => {
            let api_key = get_api_key(provider_config, "OPENAI_API_KEY", "OpenAI")?;
            let base_url = provider_config.and_then(|c| c.base_url.as_deref());
            let mut provider = OpenAiProvider::new(voice, api_key, base_url);
            if let Some(marker) = marker {
                provider = provider.with_break_marker(marker);
            }
            Box::new(provider)
        }
        BackendKind::Piper => {
            let binary = provider_config.and_then(|c| c.binary_path.clone());
            let sample_rate = provider_config.and_then(|c| c.sample_rate);
            let mut provider = PiperProvider::new(voice, binary, sample_rate)?;
            if let Some(marker) = marker {
                provider = provider.with_break_marker(marker);
            }
            Box::new(provider)
        }
    };

    backend.validate_config()?;
    Ok(backend)
}

/// Get API key from config or environment variable
fn get_api_key(
    config: Option<&ProviderConfig>,
    env_var: &str,
    provider_name: &str,
) -> Result<String> {
    // Check config first
    if let Some(key) = config.and_then(|c| c.api_key.clone()) {
        return Ok(key);
    }

    // Fall back to environment variable
    std::env::var(env_var).map_err(|_| TtsError::MissingApiKey {
        provider: provider_name.to_string(),
        env_var: env_var.to_string(),
    })
}
