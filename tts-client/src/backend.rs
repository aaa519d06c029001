use async_trait::async_trait;

use crate::audio::{AudioFormat, SynthesizedAudio};
use crate::error::Result;

/// Break marker used when a backend has no preference of its own.
pub const DEFAULT_BREAK_MARKER: &str = " @BRK#";

/// Trait for text-to-speech backends
///
/// One call synthesizes one chunk. Implementations must be safe to call
/// concurrently from several chapter workers.
#[async_trait]
pub trait SynthesisBackend: Send + Sync {
    /// Turn one chunk of text into audio
    async fn synthesize_chunk(&self, text: &str) -> Result<SynthesizedAudio>;

    /// Reject invalid voice/model/format settings before any work starts
    fn validate_config(&self) -> Result<()>;

    /// Largest chunk, in characters, a single call accepts
    fn max_chunk_chars(&self) -> usize;

    /// Sentinel marking paragraph breaks in chunk text
    fn break_marker(&self) -> &str;

    /// Container of the finished chapter files
    fn output_format(&self) -> AudioFormat;

    fn output_extension(&self) -> &'static str {
        self.output_format().extension()
    }

    /// Get the backend name for display
    fn name(&self) -> &'static str;
}

/// Replace break markers with blank lines so the engine pauses between
/// paragraphs.
pub fn expand_break_markers(text: &str, marker: &str) -> String {
    let marker = marker.trim();
    if marker.is_empty() {
        return text.trim().to_string();
    }
    text.replace(marker, "\n\n").trim().to_string()
}
