//! Model asset cache: makes sure the ONNX model and voice pack exist
//! locally before the engine loads them.

use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use super::SpeechError;
use crate::config::SpeechConfig;

/// Create the cache dir and fetch whichever asset is missing.
///
/// Blocking; call from a blocking context.
pub fn ensure_assets(config: &SpeechConfig) -> Result<(), SpeechError> {
    fs::create_dir_all(&config.model_dir)?;

    let model_path = config.model_path();
    if !model_path.exists() {
        info!("Downloading Kokoro model (first time, ~80MB int8)...");
        download(&config.model_url, &model_path)?;
    }

    let voices_path = config.voices_path();
    if !voices_path.exists() {
        info!("Downloading voice data...");
        download(&config.voices_url, &voices_path)?;
    }

    Ok(())
}

/// Stream `url` into `dest`. Data goes to a `.part` sibling first so an
/// interrupted download never leaves a truncated asset behind.
fn download(url: &str, dest: &Path) -> Result<(), SpeechError> {
    let fail = |reason: String| SpeechError::Download {
        url: url.to_string(),
        reason,
    };

    let client = reqwest::blocking::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(None)
        .build()
        .map_err(|e| fail(e.to_string()))?;

    let mut resp = client.get(url).send().map_err(|e| fail(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(fail(format!("HTTP {}", resp.status())));
    }

    let partial = dest.with_extension("part");
    let mut file = fs::File::create(&partial)?;
    let bytes = resp.copy_to(&mut file).map_err(|e| fail(e.to_string()))?;
    file.sync_all()?;
    drop(file);
    fs::rename(&partial, dest)?;

    debug!("Wrote {bytes} bytes to {}", dest.display());
    Ok(())
}
