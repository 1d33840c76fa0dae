//! garmin-sync: pull recent Garmin Connect data and print it as JSON or a
//! text report.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::{Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pai_tools::config::{Config, Credentials};
use pai_tools::garmin::auth::TokenCache;
use pai_tools::garmin::{report, sync, ConnectClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Parser, Debug)]
#[command(name = "garmin-sync", about = "Sync Garmin Connect data")]
struct Args {
    /// Number of days to fetch (default: 7)
    #[arg(long)]
    days: Option<u32>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Path to config.yaml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

async fn run(args: Args) -> Result<String, Box<dyn std::error::Error>> {
    let config = Config::load(args.config.as_deref());
    let days = args.days.unwrap_or(config.garmin.days);

    let cache = TokenCache::new(config.garmin.token_dir);
    let mut client = ConnectClient::new(Credentials::from_env(), cache)?;
    client.login().await?;

    let today = Local::now().date_naive();
    debug!("Syncing {days} days up to {today}");
    let report = sync::collect(&client, today, days).await?;

    Ok(match args.output {
        OutputFormat::Json => report::render_json(&report)?,
        OutputFormat::Text => report::render_text(&report),
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr so stdout stays parseable
    let filter = if args.verbose {
        EnvFilter::new("debug,reqwest=info,hyper=info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(output) => {
            // render_text already ends with a newline
            print!("{output}");
            if !output.ends_with('\n') {
                println!();
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ERROR: {e}");
            ExitCode::FAILURE
        }
    }
}
