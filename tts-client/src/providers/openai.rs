//! OpenAI speech API provider
//!
//! Also works with self-hosted servers that implement `/audio/speech`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::audio::{AudioEncoding, AudioFormat, SynthesizedAudio};
use crate::backend::{DEFAULT_BREAK_MARKER, SynthesisBackend, expand_break_markers};
use crate::config::VoiceConfig;
use crate::error::{Result, TtsError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini-tts";
const DEFAULT_VOICE: &str = "alloy";
/// The endpoint rejects input over 4096 characters.
const MAX_INPUT_CHARS: usize = 4000;

const RESPONSE_FORMATS: &[AudioFormat] = &[
    AudioFormat::Mp3,
    AudioFormat::Opus,
    AudioFormat::Aac,
    AudioFormat::Flac,
    AudioFormat::Wav,
];

/// Provider for the OpenAI text-to-speech endpoint
pub struct OpenAiProvider {
    model: String,
    voice: String,
    speed: f32,
    instructions: Option<String>,
    format: String,
    base_url: String,
    api_key: String,
    break_marker: String,
    client: Client,
}

impl OpenAiProvider {
    /// Create a new provider; unresolved settings fall back to the endpoint defaults
    pub fn new(voice: &VoiceConfig, api_key: String, base_url: Option<&str>) -> Self {
        Self {
            model: voice.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            voice: voice.voice.clone().unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            speed: voice.speed,
            instructions: voice.instructions.clone().filter(|s| !s.trim().is_empty()),
            format: voice
                .output_format
                .clone()
                .unwrap_or_else(|| "mp3".to_string()),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            break_marker: DEFAULT_BREAK_MARKER.to_string(),
            client: Client::new(),
        }
    }

    pub fn with_break_marker(mut self, marker: impl Into<String>) -> Self {
        self.break_marker = marker.into();
        self
    }

    fn format(&self) -> Result<AudioFormat> {
        self.format.parse()
    }
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: String,
    speed: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    response_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Map a non-success HTTP status to the error the retry loop understands.
fn status_error(code: u16, retry_after: Option<u64>, message: String) -> TtsError {
    log::warn!("OpenAI returned HTTP {}: {}", code, message);
    match code {
        429 => TtsError::RateLimited { retry_after },
        503 => TtsError::ServerOverloaded { message },
        code => TtsError::ApiError {
            message,
            status_code: Some(code),
        },
    }
}

#[async_trait]
impl SynthesisBackend for OpenAiProvider {
    async fn synthesize_chunk(&self, text: &str) -> Result<SynthesizedAudio> {
        let format = self.format()?;
        let request = SpeechRequest {
            model: &self.model,
            voice: &self.voice,
            input: expand_break_markers(text, &self.break_marker),
            speed: self.speed,
            instructions: self.instructions.as_deref(),
            response_format: format.extension(),
        };

        let url = format!("{}/audio/speech", self.base_url);
        log::debug!(
            "OpenAI request: {} chars, model {}, voice {}, format {}",
            text.chars().count(),
            self.model,
            self.voice,
            format
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| TtsError::Network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let error_text = response.text().await.unwrap_or_default();
            let message =
                if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
                    error_response.error.message
                } else {
                    error_text
                };

            return Err(status_error(status.as_u16(), retry_after, message));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TtsError::Network(format!("Failed to read audio: {}", e)))?;

        if bytes.is_empty() {
            return Err(TtsError::EmptyAudio);
        }
        log::debug!("OpenAI response: {} bytes of {}", bytes.len(), format);

        Ok(SynthesizedAudio::new(
            bytes.to_vec(),
            AudioEncoding::Container(format),
        ))
    }

    fn validate_config(&self) -> Result<()> {
        let format = self.format()?;
        if !RESPONSE_FORMATS.contains(&format) {
            return Err(TtsError::Config(format!(
                "OpenAI: unsupported output format: {}",
                format
            )));
        }
        if !(0.25..=4.0).contains(&self.speed) {
            return Err(TtsError::Config(format!(
                "OpenAI: speed must be between 0.25 and 4.0, got {}",
                self.speed
            )));
        }
        if self.voice.trim().is_empty() || self.model.trim().is_empty() {
            return Err(TtsError::Config(
                "OpenAI: voice and model must not be empty".into(),
            ));
        }
        Ok(())
    }

    fn max_chunk_chars(&self) -> usize {
        MAX_INPUT_CHARS
    }

    fn break_marker(&self) -> &str {
        &self.break_marker
    }

    fn output_format(&self) -> AudioFormat {
        self.format().unwrap_or(AudioFormat::Mp3)
    }

    fn name(&self) -> &'static str {
        "OpenAI"
    }
}
