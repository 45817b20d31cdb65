//! Stub detection server binary.
//!
use anyhow::Result;
use clap::Parser;
use env_logger::TimestampPrecision;
use stub_server::{app, spawn_server};

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Address to serve the HTTP API on
    #[clap(long, default_value = "127.0.0.1:8001")]
    server_address: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let (_addr, handle) = spawn_server(app(), &args.server_address).await?;
    handle.await??;

    Ok(())
}
