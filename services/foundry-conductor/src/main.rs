// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Foundry Conductor Service
//!
//! A conductor owns a set of registered bare-metal nodes. It:
//!
//! - Registers nodes, their network ports and volume connectors
//! - Serializes mutating operations per node with an exclusive reservation
//! - Attaches/detaches storage volumes through each node's storage backend
//!   (the in-band agent or the external block-storage service)
//! - Surfaces lock, routing and backend failures as fixed HTTP statuses

use anyhow::{Context, Result};
use dropshot::{ConfigDropshot, ConfigLogging, ConfigLoggingLevel, HttpServerStarter};
use tracing::info;

use foundry_conductor::ConductorImpl;
use foundry_conductor::config::ConductorConfig;
use foundry_conductor::context::ApiContext;

/// Default bind address for the HTTP server.
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:6385";

/// Default maximum request body size (bytes).
const DEFAULT_BODY_MAX_BYTES: usize = 1024 * 1024; // 1MB

fn print_version() {
    let version = env!("CARGO_PKG_VERSION");
    let name = env!("CARGO_PKG_NAME");
    let buildstamp = option_env!("STAMP").unwrap_or("no-STAMP");
    println!("{} {} ({})", name, version, buildstamp);
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --version and --help
    let args: Vec<String> = std::env::args().collect();
    #[allow(clippy::never_loop)] // Intentional: early return on first recognized arg
    for arg in &args[1..] {
        match arg.as_str() {
            "-V" | "--version" => {
                print_version();
                return Ok(());
            }
            "-h" | "--help" => {
                print_version();
                println!("Usage: {} [OPTIONS]", args[0]);
                println!();
                println!("Options:");
                println!("  -h, --help       Display this information");
                println!("  -V, --version    Display the program's version number");
                println!();
                println!("Environment variables:");
                println!(
                    "  BIND_ADDRESS               Server bind address (default: {})",
                    DEFAULT_BIND_ADDRESS
                );
                println!("  CONDUCTOR_HOST             Conductor identity (default: hostname)");
                println!("  AGENT_LISTEN_PORT          Node agent port (default: 9999)");
                println!("  AGENT_API_VERSION          Node agent API version (default: v1)");
                println!("  AGENT_RETRY_MAX            Extra attempts on connect failure (default: 3)");
                println!("  AGENT_RETRY_INTERVAL_SECS  Delay between attempts (default: 5)");
                println!("  AGENT_TIMEOUT_SECS         Per-request timeout (default: 30)");
                println!("  BLOCK_STORAGE_URL          Block-storage service URL (optional)");
                println!(
                    "  RUST_LOG                   Log filter (default: foundry_conductor=info,dropshot=info)"
                );
                return Ok(());
            }
            _ => {
                eprintln!("Unknown option: {}", arg);
                std::process::exit(1);
            }
        }
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "foundry_conductor=info,dropshot=info".to_string()),
        ))
        .init();

    print_version();

    // Load configuration
    let config = ConductorConfig::from_env();
    info!("Conductor host: {}", config.host);
    info!("Conductor topic: {}", config.topic());

    // Create API context
    let api_context = ApiContext::new(config).context("Failed to create API context")?;

    // Get API description from the trait implementation
    let api = foundry_conductor_api::conductor_api_mod::api_description::<ConductorImpl>()
        .map_err(|e| anyhow::anyhow!("Failed to create API description: {}", e))?;

    // Configure the server
    let bind_address = std::env::var("BIND_ADDRESS")
        .unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string())
        .parse()
        .context("Invalid BIND_ADDRESS")?;

    let config_dropshot = ConfigDropshot {
        bind_address,
        default_request_body_max_bytes: DEFAULT_BODY_MAX_BYTES,
        default_handler_task_mode: dropshot::HandlerTaskMode::Detached,
        ..Default::default()
    };

    let config_logging = ConfigLogging::StderrTerminal {
        level: ConfigLoggingLevel::Info,
    };

    let log = config_logging
        .to_logger("foundry-conductor")
        .map_err(|error| anyhow::anyhow!("failed to create logger: {}", error))?;

    // Start the server
    let server = HttpServerStarter::new(&config_dropshot, api, api_context, &log)
        .map_err(|error| anyhow::anyhow!("failed to create server: {}", error))?
        .start();

    info!("Foundry conductor running on http://{}", bind_address);

    server
        .await
        .map_err(|error| anyhow::anyhow!("server failed: {}", error))
}
