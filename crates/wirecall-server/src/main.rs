//! wirecall server binary.
//!
//! # Usage
//!
//! ```bash
//! wirecall-server --port 7878
//! ```

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use wirecall_proto::Payload;
use wirecall_server::Server;

/// wirecall RPC server
#[derive(Parser, Debug)]
#[command(name = "wirecall-server")]
#[command(about = "wirecall RPC-over-TCP server")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "7878")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("wirecall server starting");

    let server = Server::bind(args.port)?;

    server.register(b"echo", Arc::new(|payload: Payload| payload))?;
    server.register(
        b"strlen",
        Arc::new(|payload: Payload| {
            let len = payload.buf_len();
            Payload::int_only(len as i64)
        }),
    )?;

    tracing::info!(port = args.port, "wirecall server listening");
    server.serve()?;

    Ok(())
}
