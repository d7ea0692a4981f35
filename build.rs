//! Build script for protoc-gen-rsproto
//!
//! This compiles proto/rsproto/request.proto into a file descriptor set that
//! carries the `CodeGeneratorRequest` and `FileDescriptorProto` schemas.

use std::io::{Error, ErrorKind, Result};
use std::path::PathBuf;

fn main() -> Result<()> {
    let out_dir = std::env::var_os("OUT_DIR")
        .map(PathBuf::from)
        .ok_or_else(|| Error::new(ErrorKind::NotFound, "OUT_DIR is not set"))?;

    prost_build::Config::new()
        .file_descriptor_set_path(out_dir.join("file_descriptor_set.bin"))
        .compile_protos(&["proto/rsproto/request.proto"], &["proto"])?;

    // Re-run if the proto file changes
    println!("cargo:rerun-if-changed=proto/rsproto/request.proto");

    Ok(())
}
