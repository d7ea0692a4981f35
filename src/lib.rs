//! protoc-gen-rsproto library
//!
//! This crate provides the code generation logic for converting Protocol Buffer
//! definitions into Rust message types annotated with wire-format tags, plus
//! the registration code and embedded descriptors consumed by the `rsproto`
//! runtime.

#![deny(unsafe_code)]
#![deny(missing_docs)]

pub mod codegen;
pub mod descriptor;
pub mod generator;
pub mod model;
pub mod options;
pub mod resolver;
pub mod types;

use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use thiserror::Error;

/// Errors that can occur during code generation
#[derive(Error, Debug)]
pub enum GeneratorError {
    /// Failed to parse the plugin parameter string
    #[error("Failed to parse options: {0}")]
    OptionsParseError(String),

    /// A field or extension referenced a type that is not in the request
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// protoc asked for a file that is not among the request's proto files
    #[error("Unknown file: {0}")]
    UnknownFile(String),

    /// Invalid plugin configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// General code generation failure
    #[error("Code generation failed: {0}")]
    CodeGenError(String),

    /// Failed to decode protobuf message
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Failed to serialize or compress a file's own descriptor
    #[error("Descriptor error for {file}: {reason}")]
    DescriptorError {
        /// Path of the schema file whose descriptor could not be embedded
        file: String,
        /// Underlying failure
        reason: String,
    },
}

/// Generate Rust sources from a protobuf CodeGeneratorRequest
///
/// This is the main entry point for the code generator.
pub fn generate(request: CodeGeneratorRequest) -> Result<CodeGeneratorResponse, GeneratorError> {
    generator::generate(request)
}

/// Generate Rust sources from raw protobuf bytes
///
/// This entry point preserves unknown and extension option data in the
/// embedded descriptors by decoding the request with prost-reflect.
pub fn generate_from_bytes(bytes: &[u8]) -> Result<CodeGeneratorResponse, GeneratorError> {
    generator::generate_from_bytes(bytes)
}
