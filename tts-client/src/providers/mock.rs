//! Mock synthesis backend for testing
//!
//! Provides a configurable mock backend that can simulate transient failures,
//! poisoned input and uneven latency. Successful calls return the chunk text's
//! UTF-8 bytes as 16-bit PCM so the merged audio can be checked for ordering.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::audio::{AudioFormat, PcmSpec, SynthesizedAudio};
use crate::backend::{DEFAULT_BREAK_MARKER, SynthesisBackend};
use crate::error::{Result, TtsError};

/// Sample rate of the PCM the mock returns
pub const MOCK_SAMPLE_RATE: u32 = 8000;

/// A mock backend for testing retry, isolation and ordering behavior
pub struct MockBackend {
    /// Number of calls to fail before succeeding (0 = always succeed)
    fail_count: AtomicUsize,
    /// Current call count
    call_count: AtomicUsize,
    /// Error to return on failure (None = always succeed)
    fail_with: Mutex<Option<TtsError>>,
    /// Chunks containing this text always fail
    fail_needle: Option<String>,
    /// Upper bound of the per-call delay in milliseconds
    max_latency_ms: u64,
    /// Text of every call, in call order
    calls: Mutex<Vec<String>>,
    max_chars: usize,
    break_marker: String,
    format: AudioFormat,
}

impl MockBackend {
    fn build(fail_count: usize, fail_with: Option<TtsError>) -> Self {
        Self {
            fail_count: AtomicUsize::new(fail_count),
            call_count: AtomicUsize::new(0),
            fail_with: Mutex::new(fail_with),
            fail_needle: None,
            max_latency_ms: 0,
            calls: Mutex::new(Vec::new()),
            max_chars: 4000,
            break_marker: DEFAULT_BREAK_MARKER.to_string(),
            format: AudioFormat::Wav,
        }
    }

    /// Create a backend that always succeeds
    pub fn always_succeeds() -> Self {
        Self::build(0, None)
    }

    /// Create a backend that fails `n` times with the given error, then succeeds
    pub fn fails_then_succeeds(n: usize, error: TtsError) -> Self {
        Self::build(n, Some(error))
    }

    /// Create a backend that always fails with the given error
    pub fn always_fails(error: TtsError) -> Self {
        Self::build(usize::MAX, Some(error))
    }

    /// Create a backend that fails every chunk containing `needle`
    pub fn fails_when_contains(needle: &str, error: TtsError) -> Self {
        let mut backend = Self::build(0, Some(error));
        backend.fail_needle = Some(needle.to_string());
        backend
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    /// Delay each call by a deterministic amount below `max_ms`
    pub fn with_latency(mut self, max_ms: u64) -> Self {
        self.max_latency_ms = max_ms;
        self
    }

    pub fn with_break_marker(mut self, marker: impl Into<String>) -> Self {
        self.break_marker = marker.into();
        self
    }

    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    /// Get the number of times synthesize_chunk() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Texts passed to synthesize_chunk(), in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Bytes the mock produces for `text`
    pub fn audio_for(text: &str) -> Vec<u8> {
        let mut bytes = text.as_bytes().to_vec();
        if bytes.len() % 2 == 1 {
            bytes.push(b' ');
        }
        bytes
    }

    fn failure(&self) -> TtsError {
        self.fail_with
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| TtsError::Network("mock failure".into()))
    }
}

#[async_trait]
impl SynthesisBackend for MockBackend {
    async fn synthesize_chunk(&self, text: &str) -> Result<SynthesizedAudio> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(text.to_string());

        if self.max_latency_ms > 0 {
            let jitter = (call_num as u64 * 37 + text.len() as u64) % self.max_latency_ms;
            tokio::time::sleep(Duration::from_millis(jitter)).await;
        }

        if let Some(needle) = &self.fail_needle {
            if text.contains(needle.as_str()) {
                return Err(self.failure());
            }
        } else if call_num < self.fail_count.load(Ordering::SeqCst) {
            return Err(self.failure());
        }

        Ok(SynthesizedAudio::pcm(
            Self::audio_for(text),
            PcmSpec::mono(MOCK_SAMPLE_RATE),
        ))
    }

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }

    fn max_chunk_chars(&self) -> usize {
        self.max_chars
    }

    fn break_marker(&self) -> &str {
        &self.break_marker
    }

    fn output_format(&self) -> AudioFormat {
        self.format
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_always_succeeds() {
        let backend = MockBackend::always_succeeds();
        let audio = backend.synthesize_chunk("test").await.unwrap();
        assert_eq!(audio.bytes, b"test".to_vec());
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_always_fails() {
        let backend = MockBackend::always_fails(TtsError::ServerOverloaded {
            message: "overloaded".to_string(),
        });
        for _ in 0..3 {
            assert!(backend.synthesize_chunk("test").await.is_err());
        }
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_fails_then_succeeds() {
        let backend = MockBackend::fails_then_succeeds(
            2,
            TtsError::Network("reset".to_string()),
        );

        // First two calls fail
        assert!(backend.synthesize_chunk("a").await.is_err());
        assert!(backend.synthesize_chunk("a").await.is_err());

        // Third call succeeds
        assert!(backend.synthesize_chunk("a").await.is_ok());
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_fails_when_contains() {
        let backend = MockBackend::fails_when_contains("POISON", TtsError::EmptyAudio);
        assert!(backend.synthesize_chunk("clean text").await.is_ok());
        assert!(matches!(
            backend.synthesize_chunk("some POISON here").await,
            Err(TtsError::EmptyAudio)
        ));
        assert_eq!(backend.calls(), vec!["clean text", "some POISON here"]);
    }

    #[test]
    fn test_reports_configured_capabilities() {
        let backend = MockBackend::always_succeeds()
            .with_max_chars(120)
            .with_format(AudioFormat::Mp3)
            .with_break_marker(" <pause>");
        assert_eq!(backend.max_chunk_chars(), 120);
        assert_eq!(backend.output_format(), AudioFormat::Mp3);
        assert_eq!(backend.output_extension(), "mp3");
        assert_eq!(backend.break_marker(), " <pause>");

        let defaults = MockBackend::always_succeeds();
        assert_eq!(defaults.max_chunk_chars(), 4000);
        assert_eq!(defaults.break_marker(), DEFAULT_BREAK_MARKER);
        assert_eq!(defaults.output_format(), AudioFormat::Wav);
    }

    #[test]
    fn test_audio_is_padded_to_whole_samples() {
        assert_eq!(MockBackend::audio_for("abc"), b"abc ".to_vec());
        assert_eq!(MockBackend::audio_for("ab"), b"ab".to_vec());
    }
}
