//! OpenAI-compatible HTTP API for the Kokoro engine.
//!
//! Routes:
//! - `GET  /v1/models`        static model listing
//! - `GET  /health`           static health payload
//! - `POST /v1/audio/speech`  `{input, voice?, speed?}` → `audio/wav`
//! - any other GET answers with an informational message, any other POST
//!   with 404, and other methods with 501.

use std::sync::Arc;
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use super::engine::Synthesizer;
use super::{wav, SpeechError};

const INFO_MESSAGE: &str = "Kokoro TTS Server. POST /v1/audio/speech";

/// Builds the engine. Runs at most once, on the blocking pool.
pub type EngineLoader = Arc<dyn Fn() -> Result<Arc<dyn Synthesizer>, SpeechError> + Send + Sync>;

/// Process-wide engine handle, constructed on first use.
///
/// Concurrent first callers wait on the same initialisation; a failed load
/// leaves the cell empty so the next request retries.
pub struct SharedEngine {
    cell: OnceCell<Arc<dyn Synthesizer>>,
    loader: EngineLoader,
}

impl SharedEngine {
    pub fn new(loader: EngineLoader) -> Self {
        Self {
            cell: OnceCell::new(),
            loader,
        }
    }

    /// Wrap an engine that is already loaded.
    pub fn ready(engine: Arc<dyn Synthesizer>) -> Self {
        let cell = OnceCell::new_with(Some(engine.clone()));
        Self {
            cell,
            loader: Arc::new(move || Ok(engine.clone())),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get(&self) -> Result<Arc<dyn Synthesizer>, SpeechError> {
        self.cell
            .get_or_try_init(|| async {
                let loader = self.loader.clone();
                tokio::task::spawn_blocking(move || loader())
                    .await
                    .map_err(|e| SpeechError::Task(e.to_string()))?
            })
            .await
            .cloned()
    }
}

#[derive(Clone)]
pub struct SpeechApiState {
    pub engine: Arc<SharedEngine>,
    pub default_voice: String,
    pub default_speed: f32,
}

// --- Request types ---

/// Raw `/v1/audio/speech` body. Every field is optional at this layer;
/// presence is checked after parsing.
#[derive(Debug, Deserialize)]
struct SpeechBody {
    #[serde(default)]
    input: Option<String>,
    #[serde(default)]
    voice: Option<String>,
    #[serde(default)]
    speed: Option<SpeedValue>,
}

/// Clients send speed as either a number or a numeric string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SpeedValue {
    Number(f32),
    Text(String),
}

impl SpeedValue {
    fn to_f32(&self) -> Result<f32, SpeechError> {
        match self {
            Self::Number(n) => Ok(*n),
            Self::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| SpeechError::InvalidBody(format!("could not convert string to float: '{s}'"))),
        }
    }
}

/// A validated synthesis request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub speed: f32,
}

impl SpeechRequest {
    /// Parse a raw body, filling defaults. Empty or missing `input` is
    /// `MissingInput`; anything unparseable is `InvalidBody`.
    pub fn parse(body: &[u8], default_voice: &str, default_speed: f32) -> Result<Self, SpeechError> {
        let raw: SpeechBody =
            serde_json::from_slice(body).map_err(|e| SpeechError::InvalidBody(e.to_string()))?;

        let voice = raw.voice.unwrap_or_else(|| default_voice.to_string());
        let speed = match &raw.speed {
            Some(v) => v.to_f32()?,
            None => default_speed,
        };

        let text = raw.input.unwrap_or_default();
        if text.is_empty() {
            return Err(SpeechError::MissingInput);
        }

        Ok(Self { text, voice, speed })
    }
}

/// Build the axum router.
pub fn router(state: SpeechApiState) -> Router {
    Router::new()
        .route(
            "/v1/models",
            get(handle_models).post(handle_post_not_found).fallback(handle_fallback),
        )
        .route(
            "/health",
            get(handle_health).post(handle_post_not_found).fallback(handle_fallback),
        )
        .route(
            "/v1/audio/speech",
            post(handle_speech).get(handle_info).fallback(handle_fallback),
        )
        .fallback(handle_fallback)
        .layer(middleware::from_fn(log_server_errors))
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(listener: tokio::net::TcpListener, state: SpeechApiState) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutting down.");
}

// --- Access logging ---

/// Render an access log line the way http.server does.
fn access_line(method: &Method, uri: &str, version: axum::http::Version, status: StatusCode) -> String {
    format!("\"{method} {uri} {version:?}\" {} -", status.as_u16())
}

/// Only lines mentioning 500 are worth logging.
pub fn should_log(line: &str) -> bool {
    line.contains("500")
}

async fn log_server_errors(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().to_string();
    let version = req.version();

    let resp = next.run(req).await;

    let line = access_line(&method, &uri, version, resp.status());
    if should_log(&line) {
        warn!("{line}");
    }
    resp
}

// --- Handlers ---

fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

async fn handle_models() -> Response {
    json_response(
        StatusCode::OK,
        json!({"data": [{"id": "kokoro-onnx", "object": "model"}]}),
    )
}

async fn handle_health() -> Response {
    json_response(
        StatusCode::OK,
        json!({"status": "healthy", "model": "kokoro-onnx-int8", "backend": "onnxruntime"}),
    )
}

async fn handle_info() -> Response {
    json_response(StatusCode::OK, json!({"message": INFO_MESSAGE}))
}

async fn handle_post_not_found() -> Response {
    json_response(
        StatusCode::NOT_FOUND,
        json!({"error": "Not found. Use POST /v1/audio/speech"}),
    )
}

async fn handle_fallback(method: Method) -> Response {
    match method {
        Method::GET | Method::HEAD => handle_info().await,
        Method::POST => handle_post_not_found().await,
        other => json_response(
            StatusCode::NOT_IMPLEMENTED,
            json!({"error": format!("Unsupported method ({other})")}),
        ),
    }
}

async fn handle_speech(State(state): State<SpeechApiState>, body: Bytes) -> Response {
    match synthesize(&state, &body).await {
        Ok(wav_bytes) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "audio/wav")
            .header(header::CONTENT_LENGTH, wav_bytes.len())
            .body(Body::from(wav_bytes))
            .unwrap_or_else(|e| {
                error!("Error: {e}");
                json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": e.to_string()}))
            }),
        Err(SpeechError::MissingInput) => json_response(
            StatusCode::BAD_REQUEST,
            json!({"error": SpeechError::MissingInput.to_string()}),
        ),
        Err(e) => {
            error!("Error: {e}");
            json_response(StatusCode::INTERNAL_SERVER_ERROR, json!({"error": e.to_string()}))
        }
    }
}

/// Parse → engine → WAV bytes.
async fn synthesize(state: &SpeechApiState, body: &[u8]) -> Result<Vec<u8>, SpeechError> {
    let req = SpeechRequest::parse(body, &state.default_voice, state.default_speed)?;

    let t0 = Instant::now();
    let engine = state.engine.get().await?;

    let SpeechRequest { text, voice, speed } = req;
    let (audio, voice) = tokio::task::spawn_blocking(move || {
        engine.create(&text, &voice, speed).map(|audio| (audio, voice))
    })
    .await
    .map_err(|e| SpeechError::Task(e.to_string()))??;
    let gen_time = t0.elapsed().as_secs_f64();

    let wav_bytes = wav::encode(&audio)?;
    info!(
        "Generated {:.1}s audio in {gen_time:.2}s (voice={voice}, speed={speed})",
        audio.duration_secs()
    );

    Ok(wav_bytes)
}
