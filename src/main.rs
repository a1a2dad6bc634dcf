use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dotenvy::dotenv;

use page_copilot::config::Settings;
use page_copilot::gemini::GeminiClient;
use page_copilot::server::{self, AppState};

/// Local backend for the page-copilot browser extension.
#[derive(Debug, Parser)]
#[command(name = "page-copilot", version, about)]
struct Args {
    /// Address to bind the HTTP server to.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,
    /// Port to listen on.
    #[arg(long, default_value_t = 5000)]
    port: u16,
    /// Path to a file holding the Gemini API key (overrides the default
    /// search of `./key` and the user config directory).
    #[arg(long)]
    key_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let settings = Settings::load(args.key_file.as_deref());
    let state = Arc::new(AppState {
        model: GeminiClient::new(settings.api_key),
    });

    server::serve(state, &args.host, args.port).await
}
