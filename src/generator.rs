//! Request driver
//!
//! Turns a `CodeGeneratorRequest` into a `CodeGeneratorResponse`: parse the
//! parameter string, resolve every file of the request, then emit one output
//! file per entry of `file_to_generate`.

use crate::codegen;
use crate::descriptor::{self, RawDescriptors};
use crate::options::GeneratorOptions;
use crate::resolver;
use crate::GeneratorError;
use prost::Message;
use prost_types::compiler::code_generator_response::File;
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use tracing::{debug, error, info};

/// Generate from an already decoded request
pub fn generate(request: CodeGeneratorRequest) -> Result<CodeGeneratorResponse, GeneratorError> {
    let options = GeneratorOptions::parse(request.parameter())?;
    run(&request, &options, None)
}

/// Generate from the raw request bytes
///
/// Descriptors are embedded from the raw bytes so that custom options
/// survive.
pub fn generate_from_bytes(bytes: &[u8]) -> Result<CodeGeneratorResponse, GeneratorError> {
    let request = CodeGeneratorRequest::decode(bytes)
        .map_err(|e| GeneratorError::DecodeError(format!("CodeGeneratorRequest: {}", e)))?;
    let options = GeneratorOptions::parse(request.parameter())?;

    let raw = if options.register_descriptor {
        Some(RawDescriptors::from_request_bytes(bytes)?)
    } else {
        None
    };
    run(&request, &options, raw.as_ref())
}

fn run(
    request: &CodeGeneratorRequest,
    options: &GeneratorOptions,
    raw: Option<&RawDescriptors>,
) -> Result<CodeGeneratorResponse, GeneratorError> {
    let files = resolver::resolve(&request.proto_file, options)?;
    info!(
        generate = request.file_to_generate.len(),
        total = request.proto_file.len(),
        "processing request"
    );

    let mut response = CodeGeneratorResponse::default();
    let mut errors = Vec::new();

    for path in &request.file_to_generate {
        let file = files
            .get(path)
            .ok_or_else(|| GeneratorError::UnknownFile(path.clone()))?;

        let blob = if options.register_descriptor {
            blob_or_report(path, descriptor::file_blob(&file.proto, raw), &mut errors)
        } else {
            None
        };

        let generated = codegen::generate_file(file, &files, options, blob.as_deref())?;
        debug!(file = %generated.name, bytes = generated.content.len(), "generated");
        response.file.push(File {
            name: Some(generated.name),
            content: Some(generated.content),
            ..Default::default()
        });
    }

    if !errors.is_empty() {
        response.error = Some(errors.join("\n"));
    }
    Ok(response)
}

/// A file whose descriptor cannot be embedded is still generated; the
/// failure is logged and reported through the response error.
fn blob_or_report(
    path: &str,
    blob: Result<Vec<u8>, GeneratorError>,
    errors: &mut Vec<String>,
) -> Option<Vec<u8>> {
    match blob {
        Ok(blob) => Some(blob),
        Err(e) => {
            error!(file = %path, error = %e, "descriptor not embedded");
            errors.push(e.to_string());
            None
        }
    }
}
