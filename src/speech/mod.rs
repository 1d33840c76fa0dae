//! Speech synthesis façade: Kokoro ONNX behind an OpenAI-compatible
//! `/v1/audio/speech` endpoint.
//!
//! Components:
//! - `engine`: Kokoro model inference (text → phonemes → ONNX → f32 audio)
//! - `vocab`: phoneme → token id table
//! - `assets`: model/voice file download into the cache dir
//! - `wav`: in-memory WAV encoding
//! - `api`: axum router and the lazily constructed engine singleton

pub mod api;
pub mod assets;
pub mod engine;
pub mod vocab;
pub mod wav;

use thiserror::Error;

pub use engine::{AudioResult, KokoroEngine, Synthesizer};

/// Errors raised while loading the engine or serving a speech request.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Missing 'input' field")]
    MissingInput,

    #[error("{0}")]
    InvalidBody(String),

    #[error("Speed should be between 0.5 and 2.0, got {0}")]
    InvalidSpeed(f32),

    #[error("Voice not found: {0}")]
    UnknownVoice(String),

    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}
