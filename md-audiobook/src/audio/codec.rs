//! Decoding chunk audio to samples and encoding merged samples.

use super::metadata::{AudioTags, riff_info_chunk};
use crate::error::AssemblyError;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs::{self, OpenOptions};
use std::io::{Cursor, Write};
use std::path::Path;
use tts_client::{AudioEncoding, AudioFormat, PcmSpec};

/// Interleaved 16-bit samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Samples {
    pub spec: PcmSpec,
    pub data: Vec<i16>,
}

impl Samples {
    pub fn new(spec: PcmSpec, data: Vec<i16>) -> Self {
        Self { spec, data }
    }

    pub fn duration_ms(&self) -> u64 {
        let frames = self.data.len() as u64 / u64::from(self.spec.channels.max(1));
        frames * 1000 / u64::from(self.spec.sample_rate.max(1))
    }
}

/// Audio codec service used by the assembler.
pub trait AudioCodec: Send + Sync {
    fn decode(&self, bytes: &[u8], encoding: AudioEncoding) -> Result<Samples, AssemblyError>;

    fn encode(&self, samples: &Samples, format: AudioFormat) -> Result<Vec<u8>, AssemblyError>;

    /// Stamp tags onto a finished file in place.
    fn write_tags(
        &self,
        path: &Path,
        format: AudioFormat,
        tags: &AudioTags,
    ) -> Result<(), AssemblyError>;
}

/// Pure-Rust codec for raw PCM and WAV.
#[derive(Debug, Default, Clone, Copy)]
pub struct WavCodec;

impl WavCodec {
    fn decode_pcm(bytes: &[u8], spec: PcmSpec) -> Result<Samples, AssemblyError> {
        if bytes.len() % 2 != 0 {
            return Err(AssemblyError::Codec(format!(
                "raw PCM has an odd byte count ({})",
                bytes.len()
            )));
        }
        let data = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        Ok(Samples::new(spec, data))
    }

    fn decode_wav(bytes: &[u8]) -> Result<Samples, AssemblyError> {
        let mut reader = WavReader::new(Cursor::new(bytes))?;
        let spec = reader.spec();

        let data: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 16) => reader.samples::<i16>().collect::<Result<_, _>>()?,
            (SampleFormat::Int, bits) if bits <= 32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| scale_int(v, bits)))
                .collect::<Result<_, _>>()?,
            (SampleFormat::Float, 32) => reader
                .samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16))
                .collect::<Result<_, _>>()?,
            (format, bits) => {
                return Err(AssemblyError::Codec(format!(
                    "unsupported WAV sample format {:?}/{} bits",
                    format, bits
                )));
            }
        };

        Ok(Samples::new(
            PcmSpec {
                sample_rate: spec.sample_rate,
                channels: spec.channels,
            },
            data,
        ))
    }

    fn encode_wav(samples: &Samples) -> Result<Vec<u8>, AssemblyError> {
        let spec = WavSpec {
            channels: samples.spec.channels,
            sample_rate: samples.spec.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for &sample in &samples.data {
                writer.write_sample(sample)?;
            }
            writer.finalize()?;
        }
        Ok(cursor.into_inner())
    }

    /// Append a LIST/INFO chunk and fix up the RIFF size.
    fn tag_wav(path: &Path, tags: &AudioTags) -> Result<(), AssemblyError> {
        let mut bytes = fs::read(path)?;
        if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(AssemblyError::Codec(format!(
                "{} is not a RIFF/WAVE file",
                path.display()
            )));
        }

        if bytes.len() % 2 == 1 {
            bytes.push(0);
        }
        bytes.extend_from_slice(&riff_info_chunk(tags));
        let riff_size = (bytes.len() - 8) as u32;
        bytes[4..8].copy_from_slice(&riff_size.to_le_bytes());

        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        Ok(())
    }
}

fn scale_int(value: i32, bits: u16) -> i16 {
    if bits > 16 {
        (value >> (bits - 16)) as i16
    } else {
        (value << (16 - bits)) as i16
    }
}

impl AudioCodec for WavCodec {
    fn decode(&self, bytes: &[u8], encoding: AudioEncoding) -> Result<Samples, AssemblyError> {
        match encoding {
            AudioEncoding::Pcm(spec) => Self::decode_pcm(bytes, spec),
            AudioEncoding::Container(AudioFormat::Wav) => Self::decode_wav(bytes),
            AudioEncoding::Container(other) => Err(AssemblyError::Codec(format!(
                "cannot decode {} without ffmpeg",
                other
            ))),
        }
    }

    fn encode(&self, samples: &Samples, format: AudioFormat) -> Result<Vec<u8>, AssemblyError> {
        match format {
            AudioFormat::Wav => Self::encode_wav(samples),
            other => Err(AssemblyError::Codec(format!(
                "cannot encode {} without ffmpeg",
                other
            ))),
        }
    }

    fn write_tags(
        &self,
        path: &Path,
        format: AudioFormat,
        tags: &AudioTags,
    ) -> Result<(), AssemblyError> {
        match format {
            AudioFormat::Wav => Self::tag_wav(path, tags),
            other => Err(AssemblyError::Codec(format!(
                "cannot tag {} without ffmpeg",
                other
            ))),
        }
    }
}
