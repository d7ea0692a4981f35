//! Code generation for protobuf files
//!
//! One Rust source file is produced per schema file. The file is assembled
//! from token streams built by the entity emitters, parsed back with `syn`
//! and pretty-printed with `prettyplease`; the plain comment header is
//! prepended afterwards since ordinary comments do not survive as tokens.

pub mod defaults;
pub mod enumeration;
pub mod extension;
pub mod message;
pub mod oneof;
pub mod registration;
pub mod tag;

use crate::model::{Enum, Extension, File, FileSet, Message, NativeIdent};
use crate::options::GeneratorOptions;
use crate::GeneratorError;
use heck::ToSnakeCase;
use once_cell::sync::Lazy;
use proc_macro2::{Span, TokenStream};
use quote::quote;
use std::collections::HashSet;
use syn::Ident;

/// Field number of `FileDescriptorProto.package`, the path of the package comment
const FILE_PACKAGE_PATH: i32 = 2;

/// Messages and enums that get a `WellKnownType` impl
static WELL_KNOWN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "google.protobuf.Any",
        "google.protobuf.Duration",
        "google.protobuf.Empty",
        "google.protobuf.Struct",
        "google.protobuf.Timestamp",
        "google.protobuf.BoolValue",
        "google.protobuf.BytesValue",
        "google.protobuf.DoubleValue",
        "google.protobuf.FloatValue",
        "google.protobuf.Int32Value",
        "google.protobuf.Int64Value",
        "google.protobuf.ListValue",
        "google.protobuf.NullValue",
        "google.protobuf.StringValue",
        "google.protobuf.UInt32Value",
        "google.protobuf.UInt64Value",
        "google.protobuf.Value",
    ]
    .into_iter()
    .collect()
});

/// Rust keywords that cannot be used as plain identifiers
const KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final",
    "gen", "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
];

/// Keywords that are not allowed as raw identifiers either
const NON_RAW_KEYWORDS: &[&str] = &["crate", "self", "Self", "super"];

/// Whether `name` is a Rust keyword
pub fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Make `name` usable as an identifier in source text
///
/// Keywords become raw identifiers, except the path keywords which cannot be
/// raw and get a trailing underscore instead.
pub fn escape_ident(name: &str) -> String {
    if NON_RAW_KEYWORDS.contains(&name) || name == "_" {
        format!("{}_", name)
    } else if is_keyword(name) {
        format!("r#{}", name)
    } else {
        name.to_string()
    }
}

/// Build an identifier token, escaping keywords
pub fn ident(name: &str) -> Ident {
    if NON_RAW_KEYWORDS.contains(&name) || name == "_" {
        Ident::new(&format!("{}_", name), Span::call_site())
    } else if is_keyword(name) {
        Ident::new_raw(name, Span::call_site())
    } else {
        Ident::new(name, Span::call_site())
    }
}

/// Snake-cased identifier for struct fields and getters
///
/// Names that snake-case to nothing become `__`; a leading digit gets a `_` prefix.
pub fn field_ident(name: &str) -> Ident {
    let snake = name.to_snake_case();
    match snake.chars().next() {
        None => ident("_"),
        Some(c) if c.is_ascii_digit() => ident(&format!("_{}", snake)),
        Some(_) => ident(&snake),
    }
}

/// Parse a Rust type rendered by the type mapper
pub fn parse_type(ty: &str) -> Result<syn::Type, GeneratorError> {
    syn::parse_str(ty)
        .map_err(|e| GeneratorError::CodeGenError(format!("invalid Rust type `{}`: {}", ty, e)))
}

/// Parse a Rust path from configuration or module mapping
pub fn parse_path(path: &str) -> Result<syn::Path, GeneratorError> {
    syn::parse_str(path)
        .map_err(|e| GeneratorError::CodeGenError(format!("invalid Rust path `{}`: {}", path, e)))
}

/// Lint allowances attached to every generated item
pub fn allow_lints() -> TokenStream {
    quote! {
        #[allow(non_camel_case_types, non_upper_case_globals, non_snake_case, dead_code)]
    }
}

/// Per-file generation context shared by the emitters
pub struct Context<'a> {
    /// The file being generated
    pub file: &'a File,
    /// Every file of the request
    pub files: &'a FileSet,
    /// Runtime crate path
    pub runtime: syn::Path,
    /// Name of the embedded descriptor, when one is emitted
    pub descriptor_var: Option<Ident>,
}

impl<'a> Context<'a> {
    /// Module of the generated code
    pub fn module(&self) -> &str {
        &self.file.module
    }

    /// Type of a resolved entity as seen from this file
    pub fn native_type(&self, ident: &NativeIdent) -> Result<syn::Type, GeneratorError> {
        parse_type(&ident.qualified(self.module()))
    }

    /// `#[doc]` attributes for the leading comment at `path`
    pub fn doc(&self, path: &[i32]) -> TokenStream {
        match self.file.comments.get(path) {
            Some(comment) => doc_lines(comment),
            None => TokenStream::new(),
        }
    }

    /// `descriptor()` style accessor returning the blob and locator indices
    pub fn descriptor_accessor(&self, name: &str, path: &[i32]) -> TokenStream {
        let Some(var) = &self.descriptor_var else {
            return TokenStream::new();
        };
        let name = ident(name);
        let indexes = locator(path);
        quote! {
            pub fn #name() -> (&'static [u8], &'static [usize]) {
                (#var, &[#(#indexes),*])
            }
        }
    }

    /// `WellKnownType` impl for messages and enums that are well-known types
    pub fn well_known_impl(
        &self,
        full_name: &str,
        short_name: &str,
        ty: &Ident,
    ) -> TokenStream {
        if !WELL_KNOWN_TYPES.contains(full_name) {
            return TokenStream::new();
        }
        let runtime = &self.runtime;
        quote! {
            impl #runtime::WellKnownType for #ty {
                fn xxx_well_known_type(&self) -> &'static str {
                    #short_name
                }
            }
        }
    }
}

/// `#[doc]` attributes for a comment, one per line
pub fn doc_lines(comment: &str) -> TokenStream {
    let lines: Vec<&str> = comment.strip_suffix('\n').unwrap_or(comment).split('\n').collect();
    quote! { #(#[doc = #lines])* }
}

/// `#[deprecated]` when `deprecated` is set
pub fn deprecated_attr(deprecated: bool) -> TokenStream {
    if deprecated {
        quote! { #[deprecated] }
    } else {
        TokenStream::new()
    }
}

/// Descriptor locator: the element indices of a source path
pub fn locator(path: &[i32]) -> Vec<usize> {
    path.iter()
        .skip(1)
        .step_by(2)
        .map(|&i| i as usize)
        .collect()
}

/// Messages in depth-first pre-order
pub fn walk_messages(messages: &[Message]) -> Vec<&Message> {
    let mut out = Vec::new();
    fn visit<'m>(messages: &'m [Message], out: &mut Vec<&'m Message>) {
        for message in messages {
            out.push(message);
            visit(&message.messages, out);
        }
    }
    visit(messages, &mut out);
    out
}

/// File enums, then the enums of each message in walk order
pub fn all_enums(file: &File) -> Vec<&Enum> {
    let mut enums: Vec<&Enum> = file.enums.iter().collect();
    for message in walk_messages(&file.messages) {
        enums.extend(message.enums.iter());
    }
    enums
}

/// Nested extensions of each message in walk order, then the file extensions
pub fn all_extensions(file: &File) -> Vec<&Extension> {
    let mut extensions: Vec<&Extension> = walk_messages(&file.messages)
        .into_iter()
        .flat_map(|m| m.extensions.iter())
        .collect();
    extensions.extend(file.extensions.iter());
    extensions
}

/// A generated source file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Output path, e.g. `foo/bar.pb.rs`
    pub name: String,
    /// Rust source
    pub content: String,
}

/// Output path for a schema file
pub fn output_name(path: &str, options: &GeneratorOptions) -> String {
    let stem = path.strip_suffix(".proto").unwrap_or(path);
    format!("{}{}", stem, options.file_suffix)
}

/// Generate the Rust source for one file
///
/// `descriptor` is the compressed file descriptor to embed, or `None` when
/// the blob is disabled or could not be produced.
pub fn generate_file(
    file: &File,
    files: &FileSet,
    options: &GeneratorOptions,
    descriptor: Option<&[u8]>,
) -> Result<GeneratedFile, GeneratorError> {
    let ctx = Context {
        file,
        files,
        runtime: parse_path(&options.runtime)?,
        descriptor_var: descriptor
            .map(|_| ident(&crate::descriptor::descriptor_var(&file.path))),
    };
    let runtime = &ctx.runtime;

    let mut items = Vec::new();
    items.push(quote! {
        const _: () = #runtime::PROTO_PACKAGE_IS_VERSION_2;
    });

    items.push(generate_imports(&ctx)?);

    for enum_decl in all_enums(file) {
        items.push(enumeration::generate(&ctx, enum_decl)?);
    }
    for message in walk_messages(&file.messages) {
        items.push(message::generate(&ctx, message)?);
    }
    for ext in &file.extensions {
        items.push(extension::generate(&ctx, ext)?);
    }

    items.push(registration::generate_register_types(&ctx)?);
    if let Some(blob) = descriptor {
        items.push(registration::generate_descriptor(&ctx, blob));
    }

    let tokens = quote! { #(#items)* };
    let syntax_tree: syn::File = syn::parse2(tokens).map_err(|e| {
        GeneratorError::CodeGenError(format!("generated code for {} does not parse: {}", file.path, e))
    })?;

    Ok(GeneratedFile {
        name: output_name(&file.path, options),
        content: format!("{}\n{}", header(file), prettyplease::unparse(&syntax_tree)),
    })
}

/// Plain comment header: generator banner, source line and package comment
fn header(file: &File) -> String {
    let mut out = String::from("// Code generated by protoc-gen-rsproto. DO NOT EDIT.\n");
    if file.deprecated {
        out.push_str(&format!("// {} is a deprecated file.\n", file.path));
    } else {
        out.push_str(&format!("// source: {}\n", file.path));
    }
    if let Some(comment) = file.comments.get(&vec![FILE_PACKAGE_PATH]) {
        out.push('\n');
        for line in comment.strip_suffix('\n').unwrap_or(comment).split('\n') {
            out.push_str(&format!("//{}\n", line));
        }
    }
    out
}

/// Dependency references and public re-exports
fn generate_imports(ctx: &Context<'_>) -> Result<TokenStream, GeneratorError> {
    let mut seen = HashSet::new();
    let mut items = Vec::new();

    for import in &ctx.file.imports {
        let imported = ctx
            .files
            .get(&import.path)
            .ok_or_else(|| GeneratorError::UnknownFile(import.path.clone()))?;
        if imported.module == ctx.file.module {
            continue;
        }

        // A bare `crate` root cannot be imported under `_`
        let root_only = NON_RAW_KEYWORDS.contains(&imported.module.as_str());
        if !root_only && seen.insert(imported.module.clone()) {
            let module = parse_path(&imported.module)?;
            items.push(quote! {
                #[allow(unused_imports)]
                use #module as _;
            });
        }

        if import.public {
            items.push(public_reexports(ctx, imported)?);
        }
    }

    Ok(quote! { #(#items)* })
}

/// `pub use` of every message, oneof and enum of a publicly imported file
fn public_reexports(ctx: &Context<'_>, imported: &File) -> Result<TokenStream, GeneratorError> {
    let mut paths = Vec::new();
    let mut enums: Vec<&Enum> = imported.enums.iter().collect();

    for message in walk_messages(&imported.messages) {
        enums.extend(message.enums.iter());
        if message.map_entry {
            continue;
        }
        paths.push(message.ident.clone());
        for oneof in &message.oneofs {
            paths.push(oneof.ident.clone());
        }
    }
    for enum_decl in enums {
        paths.push(enum_decl.ident.clone());
        paths.push(NativeIdent::new(format!("{}_name", enum_decl.ident.name), &enum_decl.ident.module));
        paths.push(NativeIdent::new(format!("{}_value", enum_decl.ident.name), &enum_decl.ident.module));
    }

    let mut uses = Vec::with_capacity(paths.len());
    for path in paths {
        let path = parse_path(&path.qualified(ctx.module()))?;
        uses.push(quote! {
            pub use #path;
        });
    }
    Ok(quote! { #(#uses)* })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::model::Syntax;
    use std::collections::HashMap;

    pub(crate) fn empty_file(syntax: Syntax) -> File {
        File {
            path: "test/test.proto".to_string(),
            package: "test".to_string(),
            syntax,
            module: "crate::test".to_string(),
            deprecated: false,
            messages: Vec::new(),
            enums: Vec::new(),
            extensions: Vec::new(),
            imports: Vec::new(),
            comments: HashMap::new(),
            proto: Default::default(),
        }
    }

    pub(crate) fn context<'a>(file: &'a File, files: &'a FileSet) -> Context<'a> {
        Context {
            file,
            files,
            runtime: parse_path("::rsproto").unwrap(),
            descriptor_var: Some(ident("fileDescriptor_0011223344556677")),
        }
    }

    pub(crate) fn pretty(tokens: TokenStream) -> String {
        prettyplease::unparse(&syn::parse2(tokens).unwrap())
    }

    #[test]
    fn test_escape_ident() {
        assert_eq!(escape_ident("foo"), "foo");
        assert_eq!(escape_ident("type"), "r#type");
        assert_eq!(escape_ident("self"), "self_");
        assert_eq!(escape_ident("Self"), "Self_");
    }

    #[test]
    fn test_ident_tokens() {
        assert_eq!(ident("match").to_string(), "r#match");
        assert_eq!(ident("super").to_string(), "super_");
        assert_eq!(field_ident("fooBar").to_string(), "foo_bar");
    }

    #[test]
    fn test_underscore_field_names() {
        assert_eq!(field_ident("_1").to_string(), "_1");
        assert_eq!(field_ident("_").to_string(), "__");
        assert_eq!(field_ident("__").to_string(), "__");
        assert_eq!(field_ident("_type").to_string(), "r#type");
    }

    #[test]
    fn test_locator_takes_odd_positions() {
        assert_eq!(locator(&[4, 3, 3, 1, 4, 0]), vec![3, 1, 0]);
        assert_eq!(locator(&[5, 2]), vec![2]);
    }

    #[test]
    fn test_output_name() {
        let options = GeneratorOptions::default();
        assert_eq!(output_name("foo/bar.proto", &options), "foo/bar.pb.rs");
        assert_eq!(output_name("weird", &options), "weird.pb.rs");
    }

    #[test]
    fn test_doc_lines_splits_comment() {
        let tokens = doc_lines(" first\n second\n").to_string();
        assert!(tokens.contains("\" first\""));
        assert!(tokens.contains("\" second\""));
        assert_eq!(tokens.matches("doc").count(), 2);
    }
}
