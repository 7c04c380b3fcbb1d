//! `uap-server` — binds a UDP socket and serves the UAP protocol (spec §6).
//!
//! Operator shutdown: a `q` line on a TTY, or EOF on any input source, stops
//! the server (§4.7). Both are read on a dedicated thread so the main thread
//! can block waiting for the shutdown signal without polling.

use std::io::BufRead;
use std::sync::mpsc;

use clap::Parser;
use uap::{Server, ServerConfig};

/// Standalone UDP Application Protocol server.
#[derive(Parser)]
#[command(name = "uap-server", about = "UDP Application Protocol server")]
struct Args {
    /// UDP port to bind on 0.0.0.0.
    port: u16,

    /// Number of worker shards; a session's shard is `session_id mod shards`.
    #[arg(long, default_value_t = uap::server::DEFAULT_SHARD_COUNT)]
    shards: usize,

    /// Idle session timeout in seconds before the cleaner sends GOODBYE.
    #[arg(long, default_value_t = uap::server::DEFAULT_IDLE_TIMEOUT.as_secs())]
    idle_timeout_secs: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let bind_addr = format!("0.0.0.0:{}", args.port);

    let config = ServerConfig {
        shard_count: args.shards,
        idle_timeout: std::time::Duration::from_secs(args.idle_timeout_secs),
    };

    let mut server = Server::with_config(&bind_addr, config);
    if let Err(e) = server.start() {
        eprintln!("failed to start server: {e}");
        std::process::exit(1);
    }

    println!("UAP server listening on {bind_addr}");
    println!("Type 'q' to quit.");

    let (tx, rx) = mpsc::channel::<()>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim_end() == "q" => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }
        let _ = tx.send(());
    });
    let _ = rx.recv();

    server.stop();
    println!("Server stopped.");
}
