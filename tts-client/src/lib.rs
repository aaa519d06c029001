//! Text-to-speech backend library for the md-audio workspace
//!
//! Provides a unified interface for synthesis backends:
//! - OpenAI speech API (HTTP)
//! - Piper (local subprocess)
//! - Mock (tests)

pub mod audio;
pub mod backend;
pub mod config;
pub mod error;
pub mod providers;

pub use audio::{AudioEncoding, AudioFormat, PcmSpec, SynthesizedAudio};
pub use backend::{DEFAULT_BREAK_MARKER, SynthesisBackend};
pub use config::{ProviderConfig, VoiceConfig, is_cjk_language};
pub use error::{Result, TtsError};
pub use providers::{BackendKind, MockBackend, create_backend};
