//! Codec for compressed containers, backed by the `ffmpeg` binary.

use super::codec::{AudioCodec, Samples, WavCodec};
use super::metadata::{AudioTags, create_ffmpeg_metadata};
use crate::error::AssemblyError;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{NamedTempFile, TempDir};
use tts_client::{AudioEncoding, AudioFormat};

/// Handles PCM and WAV in-process and everything else through ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    binary: PathBuf,
    wav: WavCodec,
}

impl FfmpegCodec {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            wav: WavCodec,
        }
    }

    /// Find `ffmpeg` on PATH.
    pub fn locate() -> Result<Self, AssemblyError> {
        which::which("ffmpeg")
            .map(Self::new)
            .map_err(|_| AssemblyError::Codec("ffmpeg not found on PATH".to_string()))
    }

    fn run(&self, args: &[&std::ffi::OsStr]) -> Result<(), AssemblyError> {
        let output = Command::new(&self.binary)
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(args)
            .output()
            .map_err(|e| AssemblyError::Codec(format!("Failed to run ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AssemblyError::Codec(format!("ffmpeg failed: {}", stderr.trim())));
        }
        Ok(())
    }

    /// Convert `input` to a 16-bit WAV file at `output`.
    fn to_wav(&self, input: &Path, output: &Path) -> Result<(), AssemblyError> {
        self.run(&[
            "-i".as_ref(),
            input.as_os_str(),
            "-c:a".as_ref(),
            "pcm_s16le".as_ref(),
            "-f".as_ref(),
            "wav".as_ref(),
            output.as_os_str(),
        ])
    }
}

impl AudioCodec for FfmpegCodec {
    fn decode(&self, bytes: &[u8], encoding: AudioEncoding) -> Result<Samples, AssemblyError> {
        let format = match encoding {
            AudioEncoding::Pcm(_) | AudioEncoding::Container(AudioFormat::Wav) => {
                return self.wav.decode(bytes, encoding);
            }
            AudioEncoding::Container(format) => format,
        };

        let dir = TempDir::new()?;
        let input = dir.path().join(format!("chunk.{}", format.extension()));
        let output = dir.path().join("chunk.wav");
        std::fs::write(&input, bytes)?;
        self.to_wav(&input, &output)?;

        let wav = std::fs::read(&output)?;
        self.wav.decode(&wav, AudioEncoding::Container(AudioFormat::Wav))
    }

    fn encode(&self, samples: &Samples, format: AudioFormat) -> Result<Vec<u8>, AssemblyError> {
        if format == AudioFormat::Wav {
            return self.wav.encode(samples, format);
        }

        let dir = TempDir::new()?;
        let input = dir.path().join("merged.wav");
        let output = dir.path().join(format!("merged.{}", format.extension()));
        std::fs::write(&input, self.wav.encode(samples, AudioFormat::Wav)?)?;

        self.run(&[
            "-i".as_ref(),
            input.as_os_str(),
            "-f".as_ref(),
            format.ffmpeg_muxer().as_ref(),
            output.as_os_str(),
        ])?;

        Ok(std::fs::read(&output)?)
    }

    /// Remux with the tags applied, then swap the result in place.
    fn write_tags(
        &self,
        path: &Path,
        format: AudioFormat,
        tags: &AudioTags,
    ) -> Result<(), AssemblyError> {
        if format == AudioFormat::Wav {
            return self.wav.write_tags(path, format, tags);
        }

        let dir = TempDir::new()?;
        let metadata = dir.path().join("metadata.txt");
        create_ffmpeg_metadata(tags, &metadata)?;

        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        let tagged = NamedTempFile::new_in(parent)?;

        self.run(&[
            "-i".as_ref(),
            path.as_os_str(),
            "-i".as_ref(),
            metadata.as_os_str(),
            "-map".as_ref(),
            "0".as_ref(),
            "-map_metadata".as_ref(),
            "1".as_ref(),
            "-c".as_ref(),
            "copy".as_ref(),
            "-f".as_ref(),
            format.ffmpeg_muxer().as_ref(),
            tagged.path().as_os_str(),
        ])?;

        tagged.as_file().sync_all()?;
        tagged.persist(path).map_err(|e| AssemblyError::Io(e.error))?;
        Ok(())
    }
}
