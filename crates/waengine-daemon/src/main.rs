// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the waengine authors

//! waengine daemon (waed)
//!
//! Background process that owns every tenant's Socket Supervisor, the
//! Connection Manager, the Disconnect Watcher and the Verification Worker
//! (§2, §4.12). One process serves every instance; there is no CLI and no
//! persisted configuration file (§6) — everything is read from the
//! environment at startup.

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use waengine_adapters::{NullSocketFactory, RealSleeper};
use waengine_core::SystemClock;
use waengine_daemon::{startup, Config};
use waengine_engine::FixedWireVersion;
use waengine_store::InMemoryStore;

/// Wire protocol version the daemon hands to every new socket (§4.7 "the
/// latest wire version as reported by the library's 'fetch latest'
/// helper"). Pinned rather than fetched — no protocol library is reachable
/// from this workspace (§1); a deployment with one swaps `FixedWireVersion`
/// for a real fetcher without touching `waengine-engine`.
const PINNED_WIRE_VERSION: [u32; 3] = [2, 3000, 0];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("waed {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("waed {}", env!("CARGO_PKG_VERSION"));
                println!("WhatsApp broadcast worker engine daemon");
                println!();
                println!("USAGE:");
                println!("    waed");
                println!();
                println!("Reads configuration from the environment (WAE_SESSIONS_DIR,");
                println!("WAE_PUBLIC_DIR, WAE_MEMORY_CEILING_MB, RUST_LOG). No CLI flags.");
                return Ok(());
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: waed [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    setup_logging();

    // `panic = "abort"` in the release profile turns every panic into an
    // immediate process exit (§7 "no error aborts the process except
    // uncaught exceptions at the root"); log it first so the cause is not
    // lost in the final `SIGABRT`.
    std::panic::set_hook(Box::new(|info| {
        error!(panic = %info, "uncaught panic, process is aborting");
    }));

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load();
    info!(
        sessions_dir = %config.sessions_dir.display(),
        public_dir = %config.public_dir.display(),
        memory_ceiling_mb = config.memory_ceiling_mb,
        "starting waengine daemon"
    );

    let store = Arc::new(InMemoryStore::new());
    let sleeper = Arc::new(RealSleeper);
    let clock = Arc::new(SystemClock);
    let wire_version = Arc::new(FixedWireVersion(PINNED_WIRE_VERSION));

    let running = startup(&config, store, sleeper, clock, NullSocketFactory, wire_version).await;

    info!("daemon ready");

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    running.shutdown().await;
    info!("daemon stopped");
    Ok(())
}

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}
