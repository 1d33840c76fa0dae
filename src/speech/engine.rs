//! Kokoro TTS engine: text → phonemes → ONNX inference → f32 samples.
//!
//! Pipeline:
//! 1. Text → sentences (split on .!?)
//! 2. Sentence → phonemes (misaki-rs G2P)
//! 3. Phonemes → token IDs (Kokoro vocabulary)
//! 4. Token IDs + voice style + speed → ONNX inference → f32 audio (24kHz)
//! 5. Sentence outputs concatenated into one `AudioResult`

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use ndarray::{Array2, Array3};
use ndarray_npy::NpzReader;
use ort::value::Tensor;
use tracing::{debug, info};

use super::vocab::{self, Vocab};
use super::{assets, SpeechError};
use crate::config::SpeechConfig;

pub const SAMPLE_RATE: u32 = 24000;
const MAX_TOKENS: usize = 510; // Voice style array first dimension
const MIN_SPEED: f32 = 0.5;
const MAX_SPEED: f32 = 2.0;

/// Synthesized audio: mono f32 samples plus their rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioResult {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioResult {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Anything that can turn text into audio. The HTTP layer only sees this.
pub trait Synthesizer: Send + Sync {
    fn create(&self, text: &str, voice: &str, speed: f32) -> Result<AudioResult, SpeechError>;
}

/// Loaded voice style data: shape (510, 1, 256) f32.
struct VoiceData {
    /// Style vectors indexed by token count. shape: (510, 256)
    styles: Array2<f32>,
}

/// Native Kokoro TTS engine.
pub struct KokoroEngine {
    // ONNX model (Mutex because ort 2.0 Session::run needs &mut)
    session: Mutex<ort::session::Session>,
    phonemizer: misaki_rs::G2P,
    vocab: Vocab,
    voices: HashMap<String, VoiceData>,
}

impl KokoroEngine {
    /// Fetch missing assets, then load the model, voices, vocabulary and
    /// phonemizer. Blocking; run on the blocking pool.
    pub fn load(config: &SpeechConfig) -> Result<Self, SpeechError> {
        assets::ensure_assets(config)?;

        info!("Loading Kokoro model...");
        let t0 = Instant::now();

        let vocab = vocab::load(config.tokenizer_path.as_deref())?;
        debug!("Vocabulary loaded: {} tokens", vocab.len());

        let voices_path = config.voices_path();
        let voices = load_voices(&voices_path)?;
        debug!("Loaded {} voices from {}", voices.len(), voices_path.display());

        let model_path = config.model_path();
        let session = ort::session::Session::builder()
            .map_err(|e| SpeechError::ModelLoad(format!("Failed to create ONNX session builder: {e}")))?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)
            .map_err(|e| SpeechError::ModelLoad(format!("Failed to set optimization level: {e}")))?
            .with_intra_threads(config.intra_threads)
            .map_err(|e| SpeechError::ModelLoad(format!("Failed to set thread count: {e}")))?
            .commit_from_file(&model_path)
            .map_err(|e| SpeechError::ModelLoad(format!("Failed to load ONNX model {}: {e}", model_path.display())))?;

        let phonemizer = misaki_rs::G2P::new(misaki_rs::Language::EnglishUS);

        info!("Kokoro model ready. ({}ms)", t0.elapsed().as_millis());

        Ok(Self {
            session: Mutex::new(session),
            phonemizer,
            vocab,
            voices,
        })
    }

    pub fn list_voices(&self) -> Vec<String> {
        let mut names: Vec<String> = self.voices.keys().cloned().collect();
        names.sort();
        names
    }

    /// Generate audio samples for a single sentence.
    fn generate_sentence(&self, text: &str, voice: &VoiceData, speed: f32) -> Result<Vec<f32>, SpeechError> {
        // 1. Text → phonemes via misaki-rs G2P
        let (phonemes, _tokens) = self
            .phonemizer
            .g2p(text)
            .map_err(|e| SpeechError::Synthesis(format!("Phonemization failed: {e}")))?;

        if phonemes.is_empty() {
            return Ok(Vec::new());
        }

        // 2. Phonemes → token batches that fit the model
        let batches = vocab::tokenize(&self.vocab, &phonemes, MAX_TOKENS);
        if batches.len() > 1 {
            debug!("Sentence split into {} token batches", batches.len());
        }

        let mut samples = Vec::new();
        for token_ids in batches {
            samples.extend(self.infer(token_ids, voice, speed)?);
        }
        Ok(samples)
    }

    /// Run the model on one padded token batch.
    fn infer(&self, token_ids: Vec<i64>, voice: &VoiceData, speed: f32) -> Result<Vec<f32>, SpeechError> {
        let n_tokens = token_ids.len();

        // 3. Style row for this batch's token count (clamped to max)
        let style_idx = style_row(n_tokens, voice.styles.nrows());
        let style_vec: Vec<f32> = voice.styles.row(style_idx).to_vec();
        let style_dim = style_vec.len();

        // 4. Build ONNX input tensors
        let tokens_array = Array2::from_shape_vec((1, n_tokens), token_ids)
            .map_err(|e| SpeechError::Synthesis(format!("Failed to create tokens tensor: {e}")))?;
        let tokens_tensor = Tensor::from_array(tokens_array)
            .map_err(|e| SpeechError::Synthesis(format!("Failed to create tokens ort tensor: {e}")))?;

        let style_array = Array2::from_shape_vec((1, style_dim), style_vec)
            .map_err(|e| SpeechError::Synthesis(format!("Failed to create style tensor: {e}")))?;
        let style_tensor = Tensor::from_array(style_array)
            .map_err(|e| SpeechError::Synthesis(format!("Failed to create style ort tensor: {e}")))?;

        let speed_array = ndarray::Array1::from_vec(vec![speed]);
        let speed_tensor = Tensor::from_array(speed_array)
            .map_err(|e| SpeechError::Synthesis(format!("Failed to create speed ort tensor: {e}")))?;

        // 5. Run ONNX inference
        let mut session = self
            .session
            .lock()
            .map_err(|_| SpeechError::Synthesis("ONNX session lock poisoned".into()))?;
        let outputs = session
            .run(ort::inputs![
                "tokens" => tokens_tensor,
                "style" => style_tensor,
                "speed" => speed_tensor
            ])
            .map_err(|e| SpeechError::Synthesis(format!("ONNX inference failed: {e}")))?;

        // 6. Extract audio samples from the first output
        let first_output = outputs
            .iter()
            .next()
            .ok_or_else(|| SpeechError::Synthesis("No output tensor from model".into()))?;

        let (_shape, audio_slice) = first_output
            .1
            .try_extract_tensor::<f32>()
            .map_err(|e| SpeechError::Synthesis(format!("Failed to extract audio tensor: {e}")))?;

        Ok(audio_slice.to_vec())
    }
}

/// Voice packs hold one style row per inner token count.
fn style_row(n_tokens: usize, rows: usize) -> usize {
    n_tokens.saturating_sub(2).min(rows.saturating_sub(1))
}

impl Synthesizer for KokoroEngine {
    fn create(&self, text: &str, voice: &str, speed: f32) -> Result<AudioResult, SpeechError> {
        if !(MIN_SPEED..=MAX_SPEED).contains(&speed) {
            return Err(SpeechError::InvalidSpeed(speed));
        }
        let voice_data = self
            .voices
            .get(voice)
            .ok_or_else(|| SpeechError::UnknownVoice(voice.to_string()))?;

        let mut samples = Vec::new();
        for sentence in split_sentences(text.trim()) {
            let chunk = self.generate_sentence(sentence, voice_data, speed)?;
            debug!(
                "Sentence: {} samples ({:.1}s)",
                chunk.len(),
                chunk.len() as f32 / SAMPLE_RATE as f32
            );
            samples.extend(chunk);
        }

        Ok(AudioResult {
            samples,
            sample_rate: SAMPLE_RATE,
        })
    }
}

// --- Helper functions ---

/// Load all voice styles from an NPZ file.
fn load_voices(path: &Path) -> Result<HashMap<String, VoiceData>, SpeechError> {
    let file = fs::File::open(path)?;

    let mut npz = NpzReader::new(file)
        .map_err(|e| SpeechError::ModelLoad(format!("Failed to read NPZ voices file: {e}")))?;

    let names: Vec<String> = npz
        .names()
        .map_err(|e| SpeechError::ModelLoad(format!("Failed to list NPZ entries: {e}")))?
        .into_iter()
        .map(|n| n.trim_end_matches(".npy").to_string())
        .collect();

    let mut voices = HashMap::new();
    for name in names {
        let arr: Array3<f32> = npz
            .by_name(&format!("{name}.npy"))
            .map_err(|e| SpeechError::ModelLoad(format!("Failed to read voice '{name}': {e}")))?;

        // Shape is (510, 1, 256). Squeeze the middle dimension to (510, 256).
        let dim0 = arr.shape()[0];
        let dim2 = arr.shape()[2];
        let styles = arr
            .into_shape_with_order((dim0, dim2))
            .map_err(|e| SpeechError::ModelLoad(format!("Failed to reshape voice '{name}': {e}")))?;
        if styles.nrows() == 0 {
            return Err(SpeechError::ModelLoad(format!("Voice '{name}' has no style rows")));
        }

        voices.insert(name, VoiceData { styles });
    }

    Ok(voices)
}

/// Split text into sentences at .!? boundaries.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();

    for (i, &b) in bytes.iter().enumerate() {
        if (b == b'.' || b == b'!' || b == b'?')
            && i + 1 < bytes.len()
            && bytes[i + 1].is_ascii_whitespace()
        {
            let end = i + 1;
            let s = text[start..end].trim();
            if !s.is_empty() {
                sentences.push(s);
            }
            start = end;
        }
    }

    // Remainder
    let s = text[start..].trim();
    if !s.is_empty() {
        sentences.push(s);
    }

    sentences
}
