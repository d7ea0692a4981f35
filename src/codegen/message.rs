//! Message code generation
//!
//! A message becomes a plain struct deriving the runtime's `Message` macro.
//! Every field carries its wire tag in a `#[protobuf(...)]` attribute; the
//! runtime reads those tags to drive marshaling through the per-message
//! `InternalMessageInfo`.

use super::{
    allow_lints, defaults, deprecated_attr, extension, field_ident, ident, oneof, parse_type,
    tag, Context,
};
use crate::model::{Cardinality, Field, Kind, Message};
use crate::types::{element_type, map_field_type};
use crate::GeneratorError;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};

/// Generate a message, its oneofs, defaults and nested extensions
///
/// Map-entry messages produce nothing; map fields use `HashMap` directly.
pub fn generate(ctx: &Context<'_>, message: &Message) -> Result<TokenStream, GeneratorError> {
    if message.map_entry {
        return Ok(TokenStream::new());
    }

    let runtime = &ctx.runtime;
    let name = ident(&message.ident.name);
    let allow = allow_lints();
    let doc = ctx.doc(&message.path);
    let deprecated = deprecated_attr(message.deprecated);

    let members = struct_members(ctx, message)?;
    let oneof_enums = message
        .oneofs
        .iter()
        .map(|o| oneof::generate_enum(ctx, message, o))
        .collect::<Result<Vec<_>, _>>()?;

    let descriptor = ctx.descriptor_accessor("descriptor", &message.path);
    let (ext_range_static, ext_range_method, message_set_json) = extension_ranges(ctx, message);
    let getters = getters(ctx, message)?;
    let holders = message
        .fields
        .iter()
        .map(|f| defaults::generate_holder(ctx, message, f))
        .collect::<Result<Vec<_>, _>>()?;
    let well_known = ctx.well_known_impl(&message.full_name, &message.name, &name);
    let hooks = message_hooks(ctx, message);
    let nested_extensions = message
        .extensions
        .iter()
        .map(|x| extension::generate(ctx, x))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(quote! {
        #doc
        #deprecated
        #allow
        #[derive(Clone, Debug, Default, PartialEq, #runtime::Message)]
        pub struct #name {
            #(#members,)*
        }

        #(#oneof_enums)*

        #allow
        #[allow(deprecated)]
        impl #name {
            pub fn reset(&mut self) {
                *self = Self::default();
            }

            #descriptor

            #ext_range_method

            #message_set_json

            #getters
        }

        #ext_range_static

        #[allow(deprecated)]
        impl ::core::fmt::Display for #name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&#runtime::compact_text_string(self))
            }
        }

        #well_known

        #hooks

        #(#holders)*

        #(#nested_extensions)*
    })
}

/// Struct members in declaration order, then the bookkeeping fields
fn struct_members(ctx: &Context<'_>, message: &Message) -> Result<Vec<TokenStream>, GeneratorError> {
    let runtime = &ctx.runtime;
    let mut members = Vec::with_capacity(message.fields.len() + 3);

    for (index, field) in message.fields.iter().enumerate() {
        if let Some(o) = field.oneof {
            let decl = &message.oneofs[o];
            if decl.fields.first() == Some(&index) {
                members.push(oneof::struct_member(decl));
            }
            continue;
        }

        let member = field_ident(&field.name);
        let ty = parse_type(&map_field_type(field, ctx.module()).field_type())?;
        let doc = ctx.doc(&field.path);
        let deprecated = deprecated_attr(field.deprecated);
        let tag = tag::encode_tag(field)?;
        let json = tag::json_tag(field);
        let attr = match field.map_entry() {
            Some(entry) => {
                let key = tag::encode_tag(&entry.key)?;
                let val = tag::encode_tag(&entry.value)?;
                quote!(#[protobuf(tag = #tag, json = #json, key = #key, val = #val)])
            }
            None => quote!(#[protobuf(tag = #tag, json = #json)]),
        };

        members.push(quote! {
            #doc
            #attr
            #deprecated
            pub #member: #ty
        });
    }

    if !message.extension_ranges.is_empty() {
        let attr = if message.message_set_wire_format {
            quote!(#[protobuf(messageset, json = "-")])
        } else {
            quote!(#[protobuf(json = "-")])
        };
        members.push(quote! {
            #attr
            pub xxx_internal_extensions: #runtime::InternalExtensions
        });
    }
    members.push(quote! {
        #[protobuf(json = "-")]
        pub xxx_unrecognized: Vec<u8>
    });
    members.push(quote! {
        #[protobuf(json = "-")]
        pub xxx_sizecache: i32
    });

    Ok(members)
}

/// `extRange_<Msg>` with inclusive ends, its accessor, and message-set JSON
fn extension_ranges(
    ctx: &Context<'_>,
    message: &Message,
) -> (TokenStream, TokenStream, TokenStream) {
    if message.extension_ranges.is_empty() {
        return (TokenStream::new(), TokenStream::new(), TokenStream::new());
    }
    let runtime = &ctx.runtime;
    let var = format_ident!("extRange_{}", message.ident.name);
    let ranges = message.extension_ranges.iter().map(|(start, end)| {
        let last = end - 1;
        quote!(#runtime::ExtensionRange { start: #start, end: #last })
    });
    let allow = allow_lints();

    let ext_static = quote! {
        #allow
        pub static #var: &[#runtime::ExtensionRange] = &[#(#ranges),*];
    };
    let method = quote! {
        pub fn extension_range_array() -> &'static [#runtime::ExtensionRange] {
            #var
        }
    };
    let json = if message.message_set_wire_format {
        quote! {
            pub fn marshal_json(&self) -> Result<Vec<u8>, #runtime::Error> {
                #runtime::marshal_message_set_json(&self.xxx_internal_extensions)
            }

            pub fn unmarshal_json(&mut self, buf: &[u8]) -> Result<(), #runtime::Error> {
                #runtime::unmarshal_message_set_json(buf, &mut self.xxx_internal_extensions)
            }
        }
    } else {
        TokenStream::new()
    };
    (ext_static, method, json)
}

/// Getters for every field, oneof members grouped under their selector
fn getters(ctx: &Context<'_>, message: &Message) -> Result<TokenStream, GeneratorError> {
    let mut getters = Vec::with_capacity(message.fields.len());
    for (index, field) in message.fields.iter().enumerate() {
        match field.oneof {
            Some(o) => {
                let decl = &message.oneofs[o];
                if decl.fields.first() == Some(&index) {
                    getters.push(oneof::generate_getters(ctx, message, decl)?);
                }
            }
            None => getters.push(field_getter(ctx, message, field)?),
        }
    }
    Ok(quote! { #(#getters)* })
}

/// Getter for a field outside any oneof
fn field_getter(
    ctx: &Context<'_>,
    message: &Message,
    field: &Field,
) -> Result<TokenStream, GeneratorError> {
    let member = field_ident(&field.name);
    let getter = format_ident!("get_{}", member.to_string().trim_start_matches("r#"));
    let deprecated = deprecated_attr(field.deprecated);
    let mapped = map_field_type(field, ctx.module());

    let (ret, body) = if field.is_map() {
        let ty = parse_type(&mapped.rust_type)?;
        (quote!(&#ty), quote!(&self.#member))
    } else if field.cardinality == Cardinality::Repeated {
        let element = parse_type(&element_type(&field.kind, ctx.module()))?;
        (quote!(&[#element]), quote!(&self.#member))
    } else {
        match &field.kind {
            Kind::Message(_) | Kind::Group(_) => {
                let element = parse_type(&element_type(&field.kind, ctx.module()))?;
                (quote!(Option<&#element>), quote!(self.#member.as_deref()))
            }
            Kind::Bytes => {
                let body = if defaults::has_nontrivial_default(field) {
                    let holder = defaults::holder_name(message, field);
                    quote! {
                        if self.#member.is_empty() {
                            #holder
                        } else {
                            &self.#member
                        }
                    }
                } else {
                    quote!(&self.#member)
                };
                (quote!(&[u8]), body)
            }
            Kind::String if mapped.indirect => {
                let fallback = defaults::getter_fallback(ctx, message, field)?;
                (quote!(&str), quote!(self.#member.as_deref().unwrap_or(#fallback)))
            }
            Kind::String => (quote!(&str), quote!(&self.#member)),
            _ => {
                let element = parse_type(&mapped.rust_type)?;
                let body = if mapped.indirect {
                    let fallback = defaults::getter_fallback(ctx, message, field)?;
                    quote!(self.#member.unwrap_or(#fallback))
                } else {
                    quote!(self.#member)
                };
                (quote!(#element), body)
            }
        }
    };

    Ok(quote! {
        #deprecated
        pub fn #getter(&self) -> #ret {
            #body
        }
    })
}

/// Table-driven marshaling hooks delegating to the message info static
fn message_hooks(ctx: &Context<'_>, message: &Message) -> TokenStream {
    let runtime = &ctx.runtime;
    let name = ident(&message.ident.name);
    let info = format_ident!("xxx_messageInfo_{}", message.ident.name);
    let allow = allow_lints();

    quote! {
        #[allow(deprecated)]
        impl #runtime::MessageHooks for #name {
            fn xxx_unmarshal(&mut self, b: &[u8]) -> Result<(), #runtime::Error> {
                #info.unmarshal(self, b)
            }

            fn xxx_marshal(&self, b: Vec<u8>, deterministic: bool) -> Result<Vec<u8>, #runtime::Error> {
                #info.marshal(b, self, deterministic)
            }

            fn xxx_merge(&mut self, src: &dyn #runtime::Message) {
                #info.merge(self, src)
            }

            fn xxx_size(&self) -> usize {
                #info.size(self)
            }

            fn xxx_discard_unknown(&mut self) {
                #info.discard_unknown(self)
            }
        }

        #allow
        pub static #info: #runtime::InternalMessageInfo = #runtime::InternalMessageInfo::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::tests::{context, empty_file, pretty};
    use crate::model::{FileSet, NativeIdent, Syntax};
    use crate::types::tests::{color_ref, map_field, message_ref, scalar};

    fn message(name: &str, fields: Vec<Field>) -> Message {
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

    fn render(syntax: Syntax, message: &Message) -> String {
        let file = empty_file(syntax);
        let files = FileSet::default();
        let ctx = context(&file, &files);
        pretty(generate(&ctx, message).unwrap())
    }

    #[test]
    fn test_proto3_scalar_field() {
        let msg = message("User", vec![scalar("id", 1, Kind::Int32, Syntax::Proto3)]);
        let code = render(Syntax::Proto3, &msg);
        assert!(code.contains("#[protobuf(tag = \"varint,1,opt,name=id,proto3\", json = \"id,omitempty\")]"));
        assert!(code.contains("pub id: i32,"));
        assert!(code.contains("pub fn get_id(&self) -> i32 {"));
        assert!(code.contains("self.id\n"));
        assert!(code.contains("pub xxx_unrecognized: Vec<u8>,"));
        assert!(code.contains("pub xxx_sizecache: i32,"));
        assert!(!code.contains("xxx_internal_extensions"));
        assert!(code.contains("pub static xxx_messageInfo_User: ::rsproto::InternalMessageInfo"));
        assert!(code.contains("(fileDescriptor_0011223344556677, &[0usize])"));
    }

    #[test]
    fn test_proto2_string_default() {
        let mut name = scalar("name", 2, Kind::String, Syntax::Proto2);
        name.default_value = Some("x".to_string());
        let msg = message("User", vec![name]);
        let code = render(Syntax::Proto2, &msg);
        assert!(code.contains("pub name: Option<String>,"));
        assert!(code.contains("tag = \"bytes,2,opt,name=name,def=x\""));
        assert!(code.contains("pub const Default_User_Name: &str = \"x\";"));
        assert!(code.contains("self.name.as_deref().unwrap_or(Default_User_Name)"));
    }

    #[test]
    fn test_proto2_enum_without_default_falls_back_to_first_value() {
        let msg = message("Paint", vec![scalar("color", 1, Kind::Enum(color_ref()), Syntax::Proto2)]);
        let code = render(Syntax::Proto2, &msg);
        assert!(code.contains("pub color: Option<Color>,"));
        assert!(code.contains("self.color.unwrap_or(Color::RED)"));
    }

    #[test]
    fn test_float_inf_default_holder() {
        let mut ratio = scalar("ratio", 1, Kind::Float, Syntax::Proto2);
        ratio.default_value = Some("-inf".to_string());
        let mut scale = scalar("scale", 2, Kind::Double, Syntax::Proto2);
        scale.default_value = Some("nan".to_string());
        let msg = message("Limits", vec![ratio, scale]);
        let code = render(Syntax::Proto2, &msg);
        assert!(code.contains("pub const Default_Limits_Ratio: f32 = f64::NEG_INFINITY as f32;"));
        assert!(code.contains("pub const Default_Limits_Scale: f64 = f64::NAN;"));
        assert!(code.contains("def=-inf"));
        assert!(code.contains("def=nan"));
    }

    #[test]
    fn test_map_field_tags_and_getter() {
        let msg = message("Item", vec![map_field(Syntax::Proto3)]);
        let code = render(Syntax::Proto3, &msg);
        assert!(code.contains("key = \"bytes,1,opt,name=key,proto3\""));
        assert!(code.contains("val = \"varint,2,opt,name=value,proto3\""));
        assert!(code.contains("pub tags: ::std::collections::HashMap<String, i32>,"));
        assert!(code.contains("pub fn get_tags(&self) -> &::std::collections::HashMap<String, i32>"));
    }

    #[test]
    fn test_message_and_repeated_getters() {
        let inner = scalar("inner", 1, Kind::Message(message_ref("Inner")), Syntax::Proto2);
        let mut nums = scalar("nums", 2, Kind::Int64, Syntax::Proto2);
        nums.cardinality = Cardinality::Repeated;
        let msg = message("Outer", vec![inner, nums]);
        let code = render(Syntax::Proto2, &msg);
        assert!(code.contains("pub inner: Option<Box<Inner>>,"));
        assert!(code.contains("pub fn get_inner(&self) -> Option<&Inner> {"));
        assert!(code.contains("self.inner.as_deref()"));
        assert!(code.contains("pub nums: Vec<i64>,"));
        assert!(code.contains("pub fn get_nums(&self) -> &[i64]"));
    }

    #[test]
    fn test_bytes_default_getter_uses_holder() {
        let mut data = scalar("data", 1, Kind::Bytes, Syntax::Proto2);
        data.default_value = Some("ab".to_string());
        let msg = message("Blob", vec![data]);
        let code = render(Syntax::Proto2, &msg);
        assert!(code.contains("pub const Default_Blob_Data: &[u8] = b\"ab\";"));
        assert!(code.contains("if self.data.is_empty() {"));
        assert!(code.contains("Default_Blob_Data\n"));
    }

    #[test]
    fn test_extension_ranges_and_message_set() {
        let mut msg = message("Container", Vec::new());
        msg.extension_ranges = vec![(100, 200), (1000, 536_870_912)];
        msg.message_set_wire_format = true;
        let code = render(Syntax::Proto2, &msg);
        assert!(code.contains("#[protobuf(messageset, json = \"-\")]"));
        assert!(code.contains("pub xxx_internal_extensions: ::rsproto::InternalExtensions,"));
        assert!(code.contains("start: 100i32"));
        assert!(code.contains("end: 199i32"));
        assert!(code.contains("end: 536870911i32"));
        assert!(code.contains("pub fn extension_range_array() -> &'static [::rsproto::ExtensionRange]"));
        assert!(code.contains("::rsproto::marshal_message_set_json(&self.xxx_internal_extensions)"));
    }

    #[test]
    fn test_map_entries_are_skipped() {
        let mut entry = message("Item_TagsEntry", Vec::new());
        entry.map_entry = true;
        let file = empty_file(Syntax::Proto3);
        let files = FileSet::default();
        let ctx = context(&file, &files);
        assert!(generate(&ctx, &entry).unwrap().is_empty());
    }

    #[test]
    fn test_well_known_type_impl() {
        let mut msg = message("Duration", Vec::new());
        msg.full_name = "google.protobuf.Duration".to_string();
        let code = render(Syntax::Proto3, &msg);
        assert!(code.contains("impl ::rsproto::WellKnownType for Duration"));
        assert!(code.contains("\"Duration\""));
    }
}
