//! Simple output matching server example
//!
//! Run with: cargo run --example simple_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example simple_server                    # binds to 0.0.0.0:8080
//!   cargo run --example simple_server localhost          # binds to 127.0.0.1:8080
//!   cargo run --example simple_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! ## Producing (send an output)
//!
//! curl -X POST http://localhost:8080/api/v1/streams/send \
//!   -H 'Content-Type: application/json' \
//!   -d '{"outputUuid":"1f0d57a2-94c4-4c05-a2a5-64d6b2b1a0c7","streamId":"job-1","output":{"step":1}}'
//!
//! ## Consuming (long-poll an output)
//!
//! curl 'http://localhost:8080/api/v1/streams/receive?streamId=job-1&timeoutSeconds=30'
//!
//! ## Features
//!
//! - Real-time matching: a consumer parked on an empty stream is handed the
//!   next output the moment it arrives
//! - Circular overwrite: fire-and-forget producers never block; the oldest
//!   buffered output is dropped when the stream is full
//! - Back-pressure: pass `blockingWriteTimeoutSeconds` to wait for space
//!   instead, and get a 424 when the window closes

use std::net::SocketAddr;
use std::sync::Arc;

use streammatch_rs::{ServerConfig, StreamRegistry, StreamServer, StreamService};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8080
/// - "localhost:9000" -> 127.0.0.1:9000
/// - "127.0.0.1" -> 127.0.0.1:8080
/// - "0.0.0.0:9000" -> 0.0.0.0:9000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8080;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: simple_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8080)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:8080".parse().unwrap(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("streammatch_rs=debug".parse()?)
                .add_directive("simple_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig::default().bind(bind_addr);

    println!("Starting output matching server on {}", config.bind_addr);
    println!();
    println!("=== Send an output ===");
    println!(
        "curl -X POST http://localhost:{port}/api/v1/streams/send \\",
        port = bind_addr.port()
    );
    println!("  -H 'Content-Type: application/json' \\");
    println!(
        "  -d '{{\"outputUuid\":\"{uuid}\",\"streamId\":\"job-1\",\"output\":{{\"step\":1}}}}'",
        uuid = uuid::Uuid::new_v4()
    );
    println!();
    println!("=== Receive an output ===");
    println!(
        "curl 'http://localhost:{port}/api/v1/streams/receive?streamId=job-1&timeoutSeconds=30'",
        port = bind_addr.port()
    );
    println!();

    let registry = Arc::new(StreamRegistry::new());
    let service = StreamService::new(registry);
    let server = StreamServer::new(config, service);

    // Run with Ctrl+C handling
    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("Failed to listen for shutdown signal: {}", e);
            }
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
