//! protoc-gen-rsproto - A protoc plugin generating Rust message types
//!
//! This binary reads a CodeGeneratorRequest from stdin and writes a
//! CodeGeneratorResponse to stdout, following the protoc plugin protocol.
//! Logs go to stderr, filtered by `RSPROTO_LOG`.

use prost::Message;
use prost_types::compiler::CodeGeneratorResponse;
use std::io::{self, Read, Write};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();

    if let Err(e) = run() {
        error!("{}", e);
        eprintln!("protoc-gen-rsproto: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RSPROTO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut buf = Vec::new();
    io::stdin().read_to_end(&mut buf)?;

    // Generation failures are reported to protoc, not as a process failure
    let response =
        protoc_gen_rsproto::generate_from_bytes(&buf).unwrap_or_else(|e| CodeGeneratorResponse {
            error: Some(e.to_string()),
            ..Default::default()
        });

    debug!(files = response.file.len(), "writing response");
    for f in &response.file {
        debug!(file = f.name.as_deref().unwrap_or("<unnamed>"), "output");
    }
    if let Some(err) = &response.error {
        error!(%err, "generation failed");
    }

    let mut out = Vec::new();
    response.encode(&mut out)?;
    io::stdout().write_all(&out)?;

    Ok(())
}
