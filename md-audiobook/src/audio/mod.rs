//! Audio assembly: merging chunk audio into tagged chapter files.

pub mod assembler;
pub mod codec;
pub mod ffmpeg;
mod metadata;

pub use assembler::AudioAssembler;
pub use codec::{AudioCodec, Samples, WavCodec};
pub use ffmpeg::FfmpegCodec;
pub use metadata::AudioTags;

use crate::error::AssemblyError;
use std::sync::Arc;
use tts_client::AudioFormat;

/// Pick the codec able to produce `format`.
///
/// WAV output never needs ffmpeg. Every other container does, so a
/// missing binary is reported before any chapter is synthesized.
pub fn codec_for(format: AudioFormat) -> Result<Arc<dyn AudioCodec>, AssemblyError> {
    if format == AudioFormat::Wav {
        return Ok(Arc::new(WavCodec));
    }
    let codec = FfmpegCodec::locate()?;
    log::debug!("Using {:?} for {} output", codec, format);
    Ok(Arc::new(codec))
}
