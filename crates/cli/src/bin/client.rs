//! `uap-client` — drives one UAP session against a server (spec §6).
//!
//! Lines typed on stdin become DATA packets; `q` on a TTY (or EOF on any
//! input source) triggers GOODBYE. The state machine itself lives in
//! [`uap::ClientSession`]; this binary only wires up CLI args and logging.

use clap::Parser;
use uap::ClientSession;

/// Connect to a UAP server and exchange interactive DATA packets.
#[derive(Parser)]
#[command(name = "uap-client", about = "UDP Application Protocol client")]
struct Args {
    /// Server hostname or IP address.
    hostname: String,

    /// Server UDP port.
    port: u16,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let session = match ClientSession::connect(&args.hostname, args.port) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("failed to connect: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = session.run() {
        eprintln!("client error: {e}");
        std::process::exit(1);
    }
}
