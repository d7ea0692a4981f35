//! Registration functions and the embedded file descriptor
//!
//! Generated code never registers itself. Each file exposes
//! `register_<stem>_types` and `register_<stem>_descriptor`, which the host
//! calls with its `Registry` once per file. Registration order is fixed:
//! enums, then per message its nested extensions, the message itself and its
//! map types, then the file-level extensions.

use super::{all_enums, all_extensions, extension, ident, parse_type, walk_messages, Context};
use crate::model::{Extension, Message};
use crate::types::{element_type, map_field_type};
use crate::GeneratorError;
use heck::ToSnakeCase;
use proc_macro2::{Literal, TokenStream};
use quote::{format_ident, quote};
use syn::Ident;
use tracing::trace;

/// Snake-cased file name without directories or extension
pub fn file_stem(path: &str) -> String {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.strip_suffix(".proto").unwrap_or(name).to_snake_case()
}

/// `register_<stem>_types`
pub fn register_types_fn(path: &str) -> Ident {
    format_ident!("register_{}_types", file_stem(path))
}

/// `register_<stem>_descriptor`
pub fn register_descriptor_fn(path: &str) -> Ident {
    format_ident!("register_{}_descriptor", file_stem(path))
}

/// The type registration function, omitted for files without entities
pub fn generate_register_types(ctx: &Context<'_>) -> Result<TokenStream, GeneratorError> {
    let file = ctx.file;
    let enums = all_enums(file);
    let messages = walk_messages(&file.messages);
    if enums.is_empty() && messages.is_empty() && all_extensions(file).is_empty() {
        return Ok(TokenStream::new());
    }

    let runtime = &ctx.runtime;
    let mut calls = Vec::new();

    for enum_decl in enums {
        let name = enum_decl.registry_name.as_str();
        let names = format_ident!("{}_name", enum_decl.ident.name);
        let values = format_ident!("{}_value", enum_decl.ident.name);
        calls.push(quote! {
            registry.register_enum(#name, #names, #values);
        });
    }

    for message in messages.into_iter().filter(|m| !m.map_entry) {
        for ext in &message.extensions {
            calls.push(register_extension(ctx, ext)?);
        }
        calls.push(register_message(ctx, message)?);
    }

    for ext in &file.extensions {
        calls.push(register_extension(ctx, ext)?);
    }

    trace!(file = %file.path, calls = calls.len(), "registration");
    let func = register_types_fn(&file.path);
    Ok(quote! {
        /// Register the enums, messages and extensions of this file
        #[allow(deprecated)]
        pub fn #func(registry: &mut #runtime::Registry) {
            #(#calls)*
        }
    })
}

/// `register_type` for a message followed by its map types in name order
fn register_message(ctx: &Context<'_>, message: &Message) -> Result<TokenStream, GeneratorError> {
    let ty = ident(&message.ident.name);
    let full_name = message.full_name.as_str();
    let mut calls = vec![quote! {
        registry.register_type::<#ty>(#full_name);
    }];

    let mut map_fields: Vec<_> = message.fields.iter().filter(|f| f.is_map()).collect();
    map_fields.sort_by(|a, b| entry_name(a).cmp(entry_name(b)));
    for field in map_fields {
        let map_type = parse_type(&map_field_type(field, ctx.module()).rust_type)?;
        let entry = entry_name(field);
        calls.push(quote! {
            registry.register_map_type::<#map_type>(#entry);
        });
    }

    Ok(quote! { #(#calls)* })
}

fn entry_name(field: &crate::model::Field) -> &str {
    field.kind.message().map_or("", |m| m.full_name.as_str())
}

/// `register_extension`, plus the message-set type for message-set elements
fn register_extension(ctx: &Context<'_>, ext: &Extension) -> Result<TokenStream, GeneratorError> {
    let var = extension::extension_var(ext);
    let mut calls = vec![quote! {
        registry.register_extension(&#var);
    }];

    if ext.is_message_set_element() {
        let ty = parse_type(&element_type(&ext.field.kind, ctx.module()))?;
        let number = ext.field.number;
        let parent = ext.parent_full_name.as_deref().unwrap_or_default();
        calls.push(quote! {
            registry.register_message_set_type::<#ty>(#number, #parent);
        });
    }

    Ok(quote! { #(#calls)* })
}

/// The compressed descriptor static and its registration function
pub fn generate_descriptor(ctx: &Context<'_>, blob: &[u8]) -> TokenStream {
    let Some(var) = &ctx.descriptor_var else {
        return TokenStream::new();
    };
    let runtime = &ctx.runtime;
    let func = register_descriptor_fn(&ctx.file.path);
    let path = ctx.file.path.as_str();
    let summary = format!(" {} bytes of a gzipped FileDescriptorProto", blob.len());
    let bytes = blob.iter().map(|b| Literal::u8_unsuffixed(*b));

    quote! {
        /// Register the embedded descriptor of this file
        pub fn #func(registry: &mut #runtime::Registry) {
            registry.register_file(#path, #var);
        }

        #[doc = #summary]
        #[allow(non_upper_case_globals)]
        pub static #var: &[u8] = &[#(#bytes),*];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::tests::{context, empty_file};
    use crate::model::{Cardinality, FileSet, Kind, MapEntry, NativeIdent, Syntax};
    use crate::types::tests::{map_field, message_ref, scalar};

    fn message(name: &str, fields: Vec<crate::model::Field>) -> Message {
        Message {
            name: name.to_string(),
            full_name: format!("test.{}", name),
            ident: NativeIdent::new(name, "crate::test"),
            fields,
            oneofs: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
            extensions: Vec::new(),
            extension_ranges: Vec::new(),
            deprecated: false,
            message_set_wire_format: false,
            map_entry: false,
            path: vec![4, 0],
        }
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("foo/bar.proto"), "bar");
        assert_eq!(file_stem("fooBar.proto"), "foo_bar");
        assert_eq!(register_types_fn("a/b/c.proto").to_string(), "register_c_types");
    }

    #[test]
    fn test_empty_file_has_no_register_function() {
        let file = empty_file(Syntax::Proto3);
        let files = FileSet::default();
        assert!(generate_register_types(&context(&file, &files)).unwrap().is_empty());
    }

    #[test]
    fn test_map_types_are_sorted_by_entry_name() {
        let mut zeta = map_field(Syntax::Proto3);
        zeta.name = "zeta".to_string();
        if let Kind::Message(m) = &mut zeta.kind {
            m.full_name = "test.Item.ZetaEntry".to_string();
        }
        let mut alpha = map_field(Syntax::Proto3);
        alpha.name = "alpha".to_string();
        if let Kind::Message(m) = &mut alpha.kind {
            m.full_name = "test.Item.AlphaEntry".to_string();
            m.map_entry = Some(Box::new(MapEntry {
                key: scalar("key", 1, Kind::Int64, Syntax::Proto3),
                value: scalar("value", 2, Kind::String, Syntax::Proto3),
            }));
        }

        let mut file = empty_file(Syntax::Proto3);
        file.messages.push(message("Item", vec![zeta, alpha]));
        let files = FileSet::default();
        let code = generate_register_types(&context(&file, &files)).unwrap().to_string();

        let item = code.find("register_type :: < Item > (\"test.Item\")").unwrap();
        let alpha = code
            .find("register_map_type :: < :: std :: collections :: HashMap < i64 , String > > (\"test.Item.AlphaEntry\")")
            .unwrap();
        let zeta = code.find("\"test.Item.ZetaEntry\"").unwrap();
        assert!(item < alpha && alpha < zeta);
    }

    #[test]
    fn test_registration_order() {
        let mut file = empty_file(Syntax::Proto2);
        file.enums.push(crate::model::Enum {
            name: "Color".to_string(),
            full_name: "test.Color".to_string(),
            ident: NativeIdent::new("Color", "crate::test"),
            registry_name: "test.Color".to_string(),
            values: Vec::new(),
            deprecated: false,
            syntax: Syntax::Proto2,
            path: vec![5, 0],
        });

        let mut element = message("Element", Vec::new());
        let mut container = message_ref("Container");
        container.message_set_wire_format = true;
        element.extensions.push(Extension {
            field: scalar("message_set_extension", 7, Kind::Message(message_ref("Element")), Syntax::Proto2),
            full_name: "test.Element.message_set_extension".to_string(),
            extended: container,
            parent: Some(NativeIdent::new("Element", "crate::test")),
            parent_full_name: Some("test.Element".to_string()),
        });
        file.messages.push(element);

        let mut tail = scalar("tail", 9, Kind::String, Syntax::Proto2);
        tail.cardinality = Cardinality::Repeated;
        file.extensions.push(Extension {
            field: tail,
            full_name: "test.tail".to_string(),
            extended: message_ref("Base"),
            parent: None,
            parent_full_name: None,
        });

        let files = FileSet::default();
        let code = generate_register_types(&context(&file, &files)).unwrap().to_string();
        assert!(code.contains("pub fn register_test_types (registry : & mut :: rsproto :: Registry)"));

        let order = [
            "register_enum (\"test.Color\" , Color_name , Color_value)",
            "register_extension (& E_Element_MessageSetExtension)",
            "register_message_set_type :: < Element > (7i32 , \"test.Element\")",
            "register_type :: < Element > (\"test.Element\")",
            "register_extension (& E_Tail)",
        ];
        let positions: Vec<usize> = order.iter().map(|s| code.find(s).unwrap()).collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_descriptor_block() {
        let file = empty_file(Syntax::Proto3);
        let files = FileSet::default();
        let code = generate_descriptor(&context(&file, &files), &[31, 139, 8]).to_string();
        assert!(code.contains("\" 3 bytes of a gzipped FileDescriptorProto\""));
        assert!(code.contains("pub static fileDescriptor_0011223344556677 : & [u8] = & [31 , 139 , 8]"));
        assert!(code.contains("register_file (\"test/test.proto\" , fileDescriptor_0011223344556677)"));
    }
}
