//! Piper provider
//!
//! Runs the local `piper` binary as a subprocess and reads raw PCM from stdout.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::audio::{AudioFormat, PcmSpec, SynthesizedAudio};
use crate::backend::{DEFAULT_BREAK_MARKER, SynthesisBackend, expand_break_markers};
use crate::config::VoiceConfig;
use crate::error::{Result, TtsError};

const DEFAULT_SAMPLE_RATE: u32 = 22050;
const MAX_INPUT_CHARS: usize = 3000;

/// Provider that pipes text through a Piper voice model
pub struct PiperProvider {
    binary: PathBuf,
    model: String,
    sample_rate: u32,
    format: String,
    break_marker: String,
}

impl PiperProvider {
    /// Create a new Piper provider
    ///
    /// Returns an error if the binary is not found.
    pub fn new(voice: &VoiceConfig, binary: Option<PathBuf>, sample_rate: Option<u32>) -> Result<Self> {
        let binary = match binary {
            Some(path) => {
                if !path.exists() {
                    return Err(TtsError::ProviderUnavailable(format!(
                        "Piper not found at specified path: {}",
                        path.display()
                    )));
                }
                path
            }
            None => which::which("piper").map_err(|_| {
                TtsError::ProviderUnavailable(
                    "Piper not found. Install from https://github.com/rhasspy/piper".into(),
                )
            })?,
        };

        Ok(Self {
            binary,
            model: voice.voice.clone().unwrap_or_default(),
            sample_rate: sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
            format: voice
                .output_format
                .clone()
                .unwrap_or_else(|| "wav".to_string()),
            break_marker: DEFAULT_BREAK_MARKER.to_string(),
        })
    }

    pub fn with_break_marker(mut self, marker: impl Into<String>) -> Self {
        self.break_marker = marker.into();
        self
    }
}

#[async_trait]
impl SynthesisBackend for PiperProvider {
    async fn synthesize_chunk(&self, text: &str) -> Result<SynthesizedAudio> {
        let input = expand_break_markers(text, &self.break_marker);
        log::debug!(
            "Piper request: {} chars, model {}",
            text.chars().count(),
            self.model
        );

        let mut child = Command::new(&self.binary)
            .args(["--model", &self.model, "--output_raw"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TtsError::Process(format!("Failed to execute: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| TtsError::Process(format!("Failed to write text: {}", e)))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TtsError::Process(format!("Failed to wait for piper: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            log::warn!("Piper exited with {}: {}", output.status, stderr.trim());
            return Err(TtsError::Process(format!("Command failed: {}", stderr.trim())));
        }

        if output.stdout.is_empty() {
            return Err(TtsError::EmptyAudio);
        }
        log::debug!("Piper response: {} bytes of PCM", output.stdout.len());

        Ok(SynthesizedAudio::pcm(
            output.stdout,
            PcmSpec::mono(self.sample_rate),
        ))
    }

    fn validate_config(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(TtsError::Config(
                "Piper: a voice model path is required (--voice)".into(),
            ));
        }
        if self.sample_rate == 0 {
            return Err(TtsError::Config("Piper: sample rate must be positive".into()));
        }
        self.format.parse::<AudioFormat>()?;
        Ok(())
    }

    fn max_chunk_chars(&self) -> usize {
        MAX_INPUT_CHARS
    }

    fn break_marker(&self) -> &str {
        &self.break_marker
    }

    fn output_format(&self) -> AudioFormat {
        self.format.parse().unwrap_or(AudioFormat::Wav)
    }

    fn name(&self) -> &'static str {
        "Piper"
    }
}
