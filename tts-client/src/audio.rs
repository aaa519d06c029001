//! Audio encodings exchanged between backends and the assembler.

use crate::error::{Result, TtsError};
use std::fmt;
use std::str::FromStr;

/// Container formats a chapter file (or a backend response) can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
    Opus,
    Aac,
    M4a,
}

impl AudioFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::Aac => "aac",
            Self::M4a => "m4a",
        }
    }

    /// Muxer name understood by `ffmpeg -f`.
    pub fn ffmpeg_muxer(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
            Self::Flac => "flac",
            Self::Ogg => "ogg",
            Self::Opus => "opus",
            Self::Aac => "adts",
            Self::M4a => "ipod",
        }
    }

    /// Whether two complete streams of this format can be joined by appending
    /// bytes. Only headerless frame streams qualify.
    pub fn supports_concatenation(&self) -> bool {
        matches!(self, Self::Mp3 | Self::Aac)
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioFormat {
    type Err = TtsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "wav" | "wave" => Ok(Self::Wav),
            "mp3" => Ok(Self::Mp3),
            "flac" => Ok(Self::Flac),
            "ogg" => Ok(Self::Ogg),
            "opus" => Ok(Self::Opus),
            "aac" => Ok(Self::Aac),
            "m4a" | "m4b" => Ok(Self::M4a),
            other => Err(TtsError::Config(format!("Unsupported audio format: {}", other))),
        }
    }
}

/// Layout of headerless 16-bit little-endian PCM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

impl PcmSpec {
    pub fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }
}

/// How the bytes of a synthesized chunk are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEncoding {
    Container(AudioFormat),
    Pcm(PcmSpec),
}

/// Raw result of one backend call.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub encoding: AudioEncoding,
}

impl SynthesizedAudio {
    pub fn new(bytes: Vec<u8>, encoding: AudioEncoding) -> Self {
        Self { bytes, encoding }
    }

    /// Wrap raw PCM returned by a local engine.
    pub fn pcm(bytes: Vec<u8>, spec: PcmSpec) -> Self {
        Self::new(bytes, AudioEncoding::Pcm(spec))
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
