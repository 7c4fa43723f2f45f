//! Manual smoke-test CLI: runs a wirecall server, or drives a client call
//! against one, from a single binary.
//!
//! # Usage
//!
//! ```bash
//! wirecall-demo serve --port 7878
//! wirecall-demo call --port 7878 --name echo --int 42
//! ```

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use wirecall_client::Client;
use wirecall_proto::Payload;
use wirecall_server::Server;

/// Drive a wirecall server or client for manual testing
#[derive(Parser, Debug)]
#[command(name = "wirecall-demo")]
#[command(about = "Drive a wirecall server or client for manual testing")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

/// The demo's two modes: run a server, or make one call against one.
#[derive(Subcommand, Debug)]
enum Command {
    /// Run a server registering `echo` and `strlen`.
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "7878")]
        port: u16,
    },
    /// Connect to a server, find a procedure, and call it once.
    Call {
        /// Server port
        #[arg(short, long, default_value = "7878")]
        port: u16,
        /// Server address
        #[arg(short, long, default_value = "127.0.0.1")]
        addr: String,
        /// Procedure name to find and call
        #[arg(short, long, default_value = "echo")]
        name: String,
        /// Integer field to send
        #[arg(short, long, default_value = "0")]
        int: i64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    match args.command {
        Command::Serve { port } => run_server(port),
        Command::Call { port, addr, name, int } => run_call(&addr, port, &name, int),
    }
}

fn run_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let server = Server::bind(port)?;
    server.register(b"echo", Arc::new(|payload: Payload| payload))?;
    server.register(
        b"strlen",
        Arc::new(|payload: Payload| Payload::int_only(payload.buf_len() as i64)),
    )?;
    tracing::info!(port, "demo server listening");
    server.serve()?;
    Ok(())
}

fn run_call(addr: &str, port: u16, name: &str, int: i64) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = Client::connect((addr, port))?;
    let handle = client.find(name.as_bytes())?;
    let result = client.call(handle, Payload::int_only(int))?;
    tracing::info!(name, i = result.i, buf_len = result.buf_len(), "call returned");
    client.close();
    Ok(())
}
