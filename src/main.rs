//! Invocation shell.
//!
//! Reads the event payload (file or stdin), builds the signed REST clients,
//! runs one scan to completion, and prints the invocation result as JSON on
//! stdout.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use limitwatch::api::rest::{BearerTokenSigner, RestClientProvider};
use limitwatch::scan::InvocationResult;
use limitwatch::{ScanConfig, Scanner};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Event payload file; stdin when omitted.
    #[arg(long)]
    event: Option<PathBuf>,

    /// Region for bootstrap identity calls and notification delivery.
    #[arg(long, env = "OCI_REGION")]
    region: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "limitwatch=info".into()),
        )
        .with_target(false)
        .init();

    info!("limitwatch v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    let raw_event = match &args.event {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read event from stdin")?;
            buf
        }
    };
    let event: serde_json::Value =
        serde_json::from_str(&raw_event).context("Event payload is not valid JSON")?;

    let outcome = match ScanConfig::from_event(event) {
        Ok(config) => {
            let signer = Arc::new(
                BearerTokenSigner::from_env().context("Failed to load API credentials")?,
            );
            let clients = Arc::new(
                RestClientProvider::new(signer, args.region)
                    .context("Failed to build API clients")?,
            );
            Scanner::new(clients, config).run().await
        }
        Err(e) => {
            // Configuration errors short-circuit before any scanning.
            println!(
                "{}",
                serde_json::to_string(&InvocationResult::Failure {
                    error: e.to_string()
                })?
            );
            std::process::exit(1);
        }
    };

    if !outcome.notification_delivered {
        tracing::warn!("Scan finished but the notification was not delivered");
    }

    let exit_code = match &outcome.result {
        InvocationResult::Success { .. } => 0,
        InvocationResult::Failure { .. } => 1,
    };
    println!("{}", serde_json::to_string(&outcome.result)?);
    std::process::exit(exit_code);
}
