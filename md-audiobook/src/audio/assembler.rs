//! Merging a chapter's chunk audio into one tagged file.

use super::codec::{AudioCodec, Samples};
use super::metadata::AudioTags;
use crate::error::AssemblyError;
use crate::synthesis::AudioBuffer;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tts_client::{AudioEncoding, AudioFormat};

#[derive(Clone)]
pub struct AudioAssembler {
    codec: Arc<dyn AudioCodec>,
    output_format: AudioFormat,
    direct_merge: bool,
}

impl AudioAssembler {
    pub fn new(codec: Arc<dyn AudioCodec>, output_format: AudioFormat) -> Self {
        Self {
            codec,
            output_format,
            direct_merge: false,
        }
    }

    /// Allow byte concatenation when every buffer is already in a
    /// frame-concatenable output container.
    pub fn with_direct_merge(mut self, direct_merge: bool) -> Self {
        self.direct_merge = direct_merge;
        self
    }

    pub fn output_format(&self) -> AudioFormat {
        self.output_format
    }

    /// Check that buffers are chunks 1..N of an N-chunk chapter, in order.
    pub fn validate(buffers: &[AudioBuffer]) -> Result<(), AssemblyError> {
        let Some(first) = buffers.first() else {
            return Err(AssemblyError::Empty);
        };
        let total = first.total();

        for (i, buffer) in buffers.iter().enumerate() {
            if buffer.index() != i + 1 {
                return Err(AssemblyError::IndexGap {
                    expected: i + 1,
                    found: buffer.index(),
                });
            }
            if buffer.total() != total {
                return Err(AssemblyError::TotalMismatch {
                    expected: total,
                    found: buffer.total(),
                });
            }
        }

        if buffers.len() != total {
            return Err(AssemblyError::TotalMismatch {
                expected: total,
                found: buffers.len(),
            });
        }
        Ok(())
    }

    fn can_concatenate(&self, buffers: &[AudioBuffer]) -> bool {
        self.direct_merge
            && self.output_format.supports_concatenation()
            && buffers
                .iter()
                .all(|b| b.audio.encoding == AudioEncoding::Container(self.output_format))
    }

    /// Merge validated buffers into the bytes of one output file.
    pub fn merge(&self, buffers: &[AudioBuffer]) -> Result<Vec<u8>, AssemblyError> {
        if self.can_concatenate(buffers) {
            log::debug!("Concatenating {} {} buffers", buffers.len(), self.output_format);
            return Ok(buffers
                .iter()
                .flat_map(|b| b.audio.bytes.iter().copied())
                .collect());
        }

        let mut merged: Option<Samples> = None;
        for buffer in buffers {
            let samples = self.codec.decode(&buffer.audio.bytes, buffer.audio.encoding)?;
            match merged.as_mut() {
                None => merged = Some(samples),
                Some(acc) => {
                    if acc.spec != samples.spec {
                        return Err(AssemblyError::SpecMismatch {
                            chunk: buffer.id.to_string(),
                            expected_rate: acc.spec.sample_rate,
                            expected_channels: acc.spec.channels,
                            found_rate: samples.spec.sample_rate,
                            found_channels: samples.spec.channels,
                        });
                    }
                    acc.data.extend_from_slice(&samples.data);
                }
            }
        }

        let merged = merged.ok_or(AssemblyError::Empty)?;
        log::debug!(
            "Encoding {} ms of audio as {}",
            merged.duration_ms(),
            self.output_format
        );
        self.codec.encode(&merged, self.output_format)
    }

    /// Validate, merge and write one chapter file.
    ///
    /// The file is written under a temporary name in the output directory,
    /// synced, tagged and only then renamed to `output_path`. On error no
    /// file exists under `output_path`.
    pub fn assemble(
        &self,
        buffers: Vec<AudioBuffer>,
        output_path: &Path,
        tags: &AudioTags,
    ) -> Result<(), AssemblyError> {
        Self::validate(&buffers)?;
        let bytes = self.merge(&buffers)?;
        drop(buffers);

        let dir = output_path.parent().unwrap_or_else(|| Path::new("."));
        let suffix = format!(".{}", self.output_format.extension());
        let mut partial = tempfile::Builder::new()
            .prefix(".partial-")
            .suffix(&suffix)
            .tempfile_in(dir)?;

        partial.write_all(&bytes)?;
        partial.as_file().sync_all()?;

        self.codec
            .write_tags(partial.path(), self.output_format, tags)?;

        partial
            .persist(output_path)
            .map_err(|e| AssemblyError::Io(e.error))?;
        Ok(())
    }
}
