//! kokoro-server: OpenAI-compatible text-to-speech server backed by Kokoro ONNX.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use pai_tools::config::Config;
use pai_tools::speech::api::{self, SharedEngine, SpeechApiState};
use pai_tools::speech::{KokoroEngine, Synthesizer};

#[derive(Parser, Debug)]
#[command(name = "kokoro-server", about = "Kokoro TTS Server")]
struct Args {
    /// Port to listen on (default: 8000)
    #[arg(long)]
    port: Option<u16>,

    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Logs go to stderr (suppress noisy ort internals)
    let filter = if args.verbose {
        EnvFilter::new("debug,ort=info")
    } else {
        EnvFilter::new("info,ort=warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(args.config.as_deref());
    if let Some(port) = args.port {
        config.speech.port = port;
    }
    let speech = config.speech;

    let engine = Arc::new(SharedEngine::new({
        let speech = speech.clone();
        Arc::new(move || {
            let kokoro = KokoroEngine::load(&speech)?;
            debug!("Voices: {}", kokoro.list_voices().join(", "));
            let engine: Arc<dyn Synthesizer> = Arc::new(kokoro);
            Ok(engine)
        })
    }));

    // Pre-load the model before accepting connections
    engine.get().await?;

    let addr = format!("{}:{}", speech.host, speech.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Kokoro TTS server running on port {}", speech.port);
    info!("  POST http://localhost:{}/v1/audio/speech", speech.port);
    info!("  GET  http://localhost:{}/health", speech.port);

    let state = SpeechApiState {
        engine,
        default_voice: speech.default_voice,
        default_speed: speech.default_speed,
    };
    api::serve(listener, state).await?;

    Ok(())
}
