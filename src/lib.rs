//! pai-tools: a Kokoro TTS server with an OpenAI-compatible speech endpoint,
//! and a Garmin Connect puller that summarises recent training and recovery.

pub mod config;
pub mod garmin;
pub mod speech;
