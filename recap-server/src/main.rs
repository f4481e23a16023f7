use std::sync::Arc;

use clap::Parser;
use recap_core::{Pipeline, RecapConfig, Secrets};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "recap.toml")]
    config: String,

    /// Log in with the service account and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience: production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match RecapConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    // Secrets are required at startup, never per request
    let secrets = match Secrets::from_env() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let pipeline = match Pipeline::from_config(&config, secrets) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            eprintln!("Failed to initialise pipeline: {}", e);
            std::process::exit(1);
        }
    };

    if args.check {
        match pipeline.check_backend().await {
            Ok(()) => println!("✅ Service-account login succeeded ({})", config.backend.base_url),
            Err(e) => {
                println!("❌ Service-account login failed: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    recap_server::http::start_http_server(pipeline, config, tx.subscribe()).await?;

    Ok(())
}
