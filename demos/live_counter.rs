//! Live count watcher.
//!
//! Demonstrates:
//! - Building a ConnectionManager with endpoints and a retry policy
//! - Receiving counts and status changes through callbacks
//! - Stopping the manager at teardown or once it gives up
//!
//! Usage:
//!   cargo run --example live_counter
//!   cargo run --example live_counter -- --debug
//!   cargo run --example live_counter -- --policy policy.json
//!   cargo run --example live_counter -- ws://127.0.0.1:8080/ws/count

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use live_counter::{ConnectionManager, RetryPolicy};
use tokio::sync::Notify;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Args
// ============================================================================

/// Command-line arguments.
#[derive(Debug, Clone, Default)]
struct Args {
    debug: bool,
    policy: Option<PathBuf>,
    endpoints: Vec<String>,
}

impl Args {
    fn parse() -> Self {
        let mut args = Self::default();
        let mut iter = std::env::args().skip(1);

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--debug" => args.debug = true,
                "--policy" => args.policy = iter.next().map(PathBuf::from),
                _ => args.endpoints.push(arg),
            }
        }

        args
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    println!("=== Live Counter ===\n");

    let policy = match &args.policy {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            RetryPolicy::from_json(&text).context("loading retry policy")?
        }
        None => RetryPolicy::default(),
    };

    let builder = ConnectionManager::builder().retry_policy(policy);
    let builder = if args.endpoints.is_empty() {
        builder.default_endpoints()
    } else {
        builder.endpoints(args.endpoints)
    };

    let gave_up = Arc::new(Notify::new());
    let notify = Arc::clone(&gave_up);

    let manager = builder
        .on_value(|count| println!("        count = {}", format_count(count)))
        .on_status(move |status| {
            println!("[{}] {}", status.kind(), status.message());
            if status.is_terminal() {
                notify.notify_one();
            }
        })
        .build()
        .context("building connection manager")?;

    manager.start();

    println!("Press Ctrl+C to exit...");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        () = gave_up.notified() => println!("\nGave up reconnecting"),
    }

    manager.stop();
    println!("\n=== Stopped ({:?}) ===", manager.snapshot().state);

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let filter = if debug {
        "live_counter=debug"
    } else {
        "live_counter=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Shortens large counts: 1234 -> 1.2K, 2500000 -> 2.5M.
fn format_count(count: f64) -> String {
    if count >= 1_000_000.0 {
        format!("{:.1}M", count / 1_000_000.0)
    } else if count >= 1_000.0 {
        format!("{:.1}K", count / 1_000.0)
    } else {
        count.to_string()
    }
}
