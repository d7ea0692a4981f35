//! Plugin parameter parsing
//!
//! protoc forwards `--rsproto_opt=...` values to the plugin as a single
//! comma-separated parameter string. Each entry is `key=value`:
//!
//! - `runtime=::rsproto` sets the path of the runtime crate
//! - `module_root=crate` sets the module that package modules hang off
//! - `extern_path=.google.protobuf=::rsproto::wkt` maps a proto package to an
//!   existing Rust module (repeatable)
//! - `file_suffix=.pb.rs` sets the output file suffix
//! - `register_descriptor=false` skips the embedded descriptor

use crate::GeneratorError;
use heck::ToSnakeCase;

/// Default runtime crate path
const DEFAULT_RUNTIME: &str = "::rsproto";

/// Default module root
const DEFAULT_MODULE_ROOT: &str = "crate";

/// Default suffix replacing `.proto` in output names
const DEFAULT_FILE_SUFFIX: &str = ".pb.rs";

/// Parsed plugin options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Runtime crate path, e.g. `::rsproto`
    pub runtime: String,
    /// Rust path under which package modules live
    pub module_root: String,
    /// (proto package prefix with leading dot, Rust path)
    pub extern_paths: Vec<(String, String)>,
    /// Output file suffix
    pub file_suffix: String,
    /// Whether to embed and register the file descriptor
    pub register_descriptor: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            runtime: DEFAULT_RUNTIME.to_string(),
            module_root: DEFAULT_MODULE_ROOT.to_string(),
            extern_paths: Vec::new(),
            file_suffix: DEFAULT_FILE_SUFFIX.to_string(),
            register_descriptor: true,
        }
    }
}

impl GeneratorOptions {
    /// Parse the plugin parameter string
    pub fn parse(parameter: &str) -> Result<Self, GeneratorError> {
        let mut options = Self::default();

        for part in split_parameter(parameter) {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                GeneratorError::OptionsParseError(format!("expected key=value, got `{}`", part))
            })?;

            match key.trim() {
                "runtime" => options.runtime = parse_rust_path(key, value)?,
                "module_root" => options.module_root = parse_rust_path(key, value)?,
                "extern_path" => options.extern_paths.push(parse_extern_path(value)?),
                "file_suffix" => {
                    if value.is_empty() {
                        return Err(GeneratorError::InvalidConfig(
                            "file_suffix must not be empty".to_string(),
                        ));
                    }
                    options.file_suffix = value.to_string();
                }
                "register_descriptor" => options.register_descriptor = parse_bool(key, value)?,
                other => {
                    return Err(GeneratorError::InvalidConfig(format!(
                        "unknown parameter `{}`",
                        other
                    )))
                }
            }
        }

        // Longest prefix first so lookups can stop at the first match
        options
            .extern_paths
            .sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        Ok(options)
    }

    /// Module path for the schema package `package`
    pub fn module_for_package(&self, package: &str) -> String {
        let dotted = format!(".{}", package);
        for (prefix, path) in &self.extern_paths {
            if dotted == *prefix {
                return path.clone();
            }
            if let Some(rest) = dotted.strip_prefix(prefix.as_str()) {
                if let Some(rest) = rest.strip_prefix('.') {
                    return join_module(path, rest);
                }
            }
        }
        join_module(&self.module_root, package)
    }
}

/// Append snake-cased package segments to a module path
fn join_module(base: &str, package: &str) -> String {
    let mut module = base.to_string();
    for segment in package.split('.').filter(|s| !s.is_empty()) {
        module.push_str("::");
        module.push_str(&module_segment(segment));
    }
    module
}

/// A package segment as a module name, escaping keywords
fn module_segment(segment: &str) -> String {
    crate::codegen::escape_ident(&segment.to_snake_case())
}

/// Split the parameter string on commas, dropping empty entries
fn split_parameter(parameter: &str) -> Vec<&str> {
    parameter
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn parse_rust_path(key: &str, value: &str) -> Result<String, GeneratorError> {
    syn::parse_str::<syn::Path>(value)
        .map(|_| value.to_string())
        .map_err(|e| {
            GeneratorError::InvalidConfig(format!("{} is not a Rust path: `{}` ({})", key, value, e))
        })
}

fn parse_extern_path(value: &str) -> Result<(String, String), GeneratorError> {
    let (package, path) = value.split_once('=').ok_or_else(|| {
        GeneratorError::InvalidConfig(format!(
            "extern_path must look like .package=::rust::path, got `{}`",
            value
        ))
    })?;
    if !package.starts_with('.') {
        return Err(GeneratorError::InvalidConfig(format!(
            "extern_path package must be fully qualified with a leading dot: `{}`",
            package
        )));
    }
    let path = parse_rust_path("extern_path", path)?;
    Ok((package.trim_end_matches('.').to_string(), path))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, GeneratorError> {
    match value {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(GeneratorError::InvalidConfig(format!(
            "{} expects true or false, got `{}`",
            key, value
        ))),
    }
}
