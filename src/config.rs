//! Configuration management for pai-tools.
//!
//! Loads config from a YAML file in standard locations. Every field has a
//! default, so a config file is optional.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

pub const MODEL_URL: &str =
    "https://github.com/thewh1teagle/kokoro-onnx/releases/download/model-files-v1.0/kokoro-v1.0.int8.onnx";
pub const VOICES_URL: &str =
    "https://github.com/thewh1teagle/kokoro-onnx/releases/download/model-files-v1.0/voices-v1.0.bin";

/// Environment variables holding the Garmin Connect credentials.
pub const GARMIN_EMAIL_VAR: &str = "GARMIN_EMAIL";
pub const GARMIN_PASSWORD_VAR: &str = "GARMIN_PASSWORD";

fn home_relative(rel: &str) -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(rel)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub host: String,
    pub port: u16,
    pub model_dir: PathBuf,
    pub model_file: String,
    pub voices_file: String,
    pub model_url: String,
    pub voices_url: String,
    /// Optional tokenizer.json overriding the built-in Kokoro vocabulary.
    pub tokenizer_path: Option<PathBuf>,
    pub default_voice: String,
    pub default_speed: f32,
    pub intra_threads: usize,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            model_dir: home_relative(".cache/kokoro-onnx"),
            model_file: "kokoro-v1.0.int8.onnx".into(),
            voices_file: "voices-v1.0.bin".into(),
            model_url: MODEL_URL.into(),
            voices_url: VOICES_URL.into(),
            tokenizer_path: None,
            default_voice: "af_heart".into(),
            default_speed: 1.0,
            intra_threads: 4,
        }
    }
}

impl SpeechConfig {
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_file)
    }

    pub fn voices_path(&self) -> PathBuf {
        self.model_dir.join(&self.voices_file)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GarminConfig {
    pub token_dir: PathBuf,
    pub days: u32,
}

impl Default for GarminConfig {
    fn default() -> Self {
        Self {
            token_dir: home_relative(".claude/garmin-tokens"),
            days: 7,
        }
    }
}

/// Garmin Connect login pair, read from the environment only.
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

impl Credentials {
    /// Missing variables read as empty strings; the login step rejects them.
    pub fn from_env() -> Self {
        Self {
            email: std::env::var(GARMIN_EMAIL_VAR).unwrap_or_default(),
            password: std::env::var(GARMIN_PASSWORD_VAR).unwrap_or_default(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.email.is_empty() && !self.password.is_empty()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub speech: SpeechConfig,
    pub garmin: GarminConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./pai-tools.yaml
    /// 2. ~/.config/pai-tools/config.yaml
    /// 3. /etc/pai-tools/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("pai-tools.yaml")),
                dirs::home_dir().map(|h| h.join(".config/pai-tools/config.yaml")),
                Some(PathBuf::from("/etc/pai-tools/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}
