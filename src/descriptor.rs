//! Embedded file descriptors
//!
//! Every generated file carries its own `FileDescriptorProto`, stripped of
//! source info and gzip-compressed. When the request arrives as raw bytes the
//! descriptors are re-encoded from a prost-reflect `DynamicMessage` instead of
//! the prost-decoded structs, which keeps custom options and other unknown
//! fields intact.

use crate::GeneratorError;
use flate2::write::GzEncoder;
use flate2::Compression;
use once_cell::sync::OnceCell;
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, Value};
use prost_types::FileDescriptorProto;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Write;
use tracing::debug;

/// File descriptor set bytes generated at build time by protoc
static FILE_DESCRIPTOR_SET_BYTES: &[u8] =
    include_bytes!(concat!(env!("OUT_DIR"), "/file_descriptor_set.bin"));

/// Lazily decoded pool holding the plugin protocol messages
static DESCRIPTOR_POOL: OnceCell<DescriptorPool> = OnceCell::new();

const REQUEST_MESSAGE: &str = "google.protobuf.compiler.CodeGeneratorRequest";

fn pool() -> Result<&'static DescriptorPool, GeneratorError> {
    DESCRIPTOR_POOL.get_or_try_init(|| {
        DescriptorPool::decode(FILE_DESCRIPTOR_SET_BYTES)
            .map_err(|e| GeneratorError::DecodeError(format!("embedded descriptor pool: {}", e)))
    })
}

/// Name of the static holding a file's descriptor
///
/// `fileDescriptor_` followed by the hex of the first 8 bytes of the
/// SHA-256 of the file path.
pub fn descriptor_var(path: &str) -> String {
    let digest = Sha256::digest(path.as_bytes());
    format!("fileDescriptor_{}", hex::encode(&digest[..8]))
}

/// Serialize a descriptor without its source code info
pub fn encode_stripped(file: &FileDescriptorProto) -> Result<Vec<u8>, GeneratorError> {
    let mut stripped = file.clone();
    stripped.source_code_info = None;

    let mut buf = Vec::with_capacity(stripped.encoded_len());
    stripped
        .encode(&mut buf)
        .map_err(|e| GeneratorError::DescriptorError {
            file: file.name().to_string(),
            reason: e.to_string(),
        })?;
    Ok(buf)
}

/// Gzip with best compression
pub fn compress(path: &str, bytes: &[u8]) -> Result<Vec<u8>, GeneratorError> {
    let to_error = |e: std::io::Error| GeneratorError::DescriptorError {
        file: path.to_string(),
        reason: e.to_string(),
    };
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(bytes).map_err(to_error)?;
    encoder.finish().map_err(to_error)
}

/// Stripped descriptor bytes of every file in a raw request, keyed by path
#[derive(Debug, Default)]
pub struct RawDescriptors {
    files: HashMap<String, Vec<u8>>,
}

impl RawDescriptors {
    /// Re-encode every `proto_file` of a raw request without source info
    pub fn from_request_bytes(bytes: &[u8]) -> Result<Self, GeneratorError> {
        let request_desc = pool()?
            .get_message_by_name(REQUEST_MESSAGE)
            .ok_or_else(|| {
                GeneratorError::DecodeError(format!("{} not found in descriptor pool", REQUEST_MESSAGE))
            })?;

        let request = DynamicMessage::decode(request_desc, bytes)
            .map_err(|e| GeneratorError::DecodeError(format!("CodeGeneratorRequest: {}", e)))?;

        let mut files = HashMap::new();
        if let Some(cow) = request.get_field_by_name("proto_file") {
            if let Value::List(list) = cow.as_ref() {
                for file_value in list {
                    let Some(file_msg) = file_value.as_message() else {
                        continue;
                    };
                    let name = file_msg
                        .get_field_by_name("name")
                        .and_then(|v| v.as_str().map(str::to_string))
                        .unwrap_or_default();

                    let mut stripped = file_msg.clone();
                    stripped.clear_field_by_name("source_code_info");
                    files.insert(name, stripped.encode_to_vec());
                }
            }
        }

        debug!(files = files.len(), "captured raw descriptors");
        Ok(Self { files })
    }

    /// Stripped bytes for `path`
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }
}

/// The compressed descriptor to embed for a file
///
/// Prefers the raw bytes captured from the request and falls back to
/// re-encoding the prost-decoded descriptor.
pub fn file_blob(
    file: &FileDescriptorProto,
    raw: Option<&RawDescriptors>,
) -> Result<Vec<u8>, GeneratorError> {
    let path = file.name();
    let encoded = match raw.and_then(|r| r.get(path)) {
        Some(bytes) => bytes.to_vec(),
        None => encode_stripped(file)?,
    };
    compress(path, &encoded)
}
