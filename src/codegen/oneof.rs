//! Oneof code generation
//!
//! Each real oneof becomes a closed sum type `<Message>_<Oneof>` with an
//! explicit `NotSet` state and one variant per member field. The containing
//! struct holds a single member of that type at the position of the oneof's
//! first field.

use super::{allow_lints, defaults, deprecated_attr, field_ident, ident, tag, Context};
use crate::model::{Field, Kind, Message, Oneof};
use crate::types::element_type;
use crate::GeneratorError;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::Ident;

/// Name of the empty variant
const NOT_SET: &str = "NotSet";

/// Variant name for a member field, kept clear of the empty variant
pub fn variant_ident(field: &Field) -> Ident {
    if field.camel_name == NOT_SET {
        format_ident!("{}_", NOT_SET)
    } else {
        ident(&field.camel_name)
    }
}

/// Payload type of a member's variant
pub fn variant_type(ctx: &Context<'_>, field: &Field) -> Result<syn::Type, GeneratorError> {
    let element = element_type(&field.kind, ctx.module());
    match &field.kind {
        Kind::Message(_) | Kind::Group(_) => super::parse_type(&format!("Box<{}>", element)),
        _ => super::parse_type(&element),
    }
}

/// The sum type for one oneof
pub fn generate_enum(
    ctx: &Context<'_>,
    message: &Message,
    oneof: &Oneof,
) -> Result<TokenStream, GeneratorError> {
    let runtime = &ctx.runtime;
    let name = ident(&oneof.ident.name);
    let not_set = ident(NOT_SET);
    let allow = allow_lints();

    let mut variants = Vec::with_capacity(oneof.fields.len());
    for &index in &oneof.fields {
        let field = &message.fields[index];
        let variant = variant_ident(field);
        let ty = variant_type(ctx, field)?;
        let tag = tag::encode_tag(field)?;
        let doc = ctx.doc(&field.path);
        let deprecated = deprecated_attr(field.deprecated);
        variants.push(quote! {
            #doc
            #deprecated
            #[protobuf(tag = #tag)]
            #variant(#ty)
        });
    }

    Ok(quote! {
        #allow
        #[derive(Clone, Debug, Default, PartialEq, #runtime::Oneof)]
        pub enum #name {
            #[default]
            #not_set,
            #(#variants,)*
        }
    })
}

/// The struct member holding a oneof
pub fn struct_member(oneof: &Oneof) -> TokenStream {
    let member = field_ident(&oneof.name);
    let ty = ident(&oneof.ident.name);
    let name = oneof.name.as_str();
    quote! {
        #[protobuf(oneof = #name)]
        pub #member: #ty
    }
}

/// Selector getter plus one getter per member field
pub fn generate_getters(
    ctx: &Context<'_>,
    message: &Message,
    oneof: &Oneof,
) -> Result<TokenStream, GeneratorError> {
    let member = field_ident(&oneof.name);
    let selector = format_ident!("get_{}", member.to_string().trim_start_matches("r#"));
    let ty = ident(&oneof.ident.name);

    let mut getters = vec![quote! {
        pub fn #selector(&self) -> &#ty {
            &self.#member
        }
    }];

    for &index in &oneof.fields {
        let field = &message.fields[index];
        let getter = format_ident!(
            "get_{}",
            field_ident(&field.name).to_string().trim_start_matches("r#")
        );
        let variant = variant_ident(field);
        let fallback = defaults::getter_fallback(ctx, message, field)?;
        let deprecated = deprecated_attr(field.deprecated);

        let (ret, value) = match &field.kind {
            Kind::String => (quote!(&str), quote!(x.as_str())),
            Kind::Bytes => (quote!(&[u8]), quote!(x.as_slice())),
            Kind::Message(_) | Kind::Group(_) => {
                let element = super::parse_type(&element_type(&field.kind, ctx.module()))?;
                (quote!(Option<&#element>), quote!(Some(&**x)))
            }
            _ => {
                let element = super::parse_type(&element_type(&field.kind, ctx.module()))?;
                (quote!(#element), quote!(*x))
            }
        };

        getters.push(quote! {
            #deprecated
            pub fn #getter(&self) -> #ret {
                match &self.#member {
                    #ty::#variant(x) => #value,
                    _ => #fallback,
                }
            }
        });
    }

    Ok(quote! { #(#getters)* })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::tests::{context, empty_file};
    use crate::model::{FileSet, NativeIdent, Syntax};
    use crate::types::tests::{message_ref, scalar};

    fn pick() -> Message {
        let mut name = scalar("name", 2, Kind::String, Syntax::Proto3);
        name.oneof = Some(0);
        let mut sub = scalar("sub", 3, Kind::Message(message_ref("Sub")), Syntax::Proto3);
        sub.oneof = Some(0);
        let mut not_set = scalar("not_set", 4, Kind::Int32, Syntax::Proto3);
        not_set.oneof = Some(0);
        Message {
            name: "Pick".to_string(),
            full_name: "test.Pick".to_string(),
            ident: NativeIdent::new("Pick", "crate::test"),
            fields: vec![scalar("id", 1, Kind::Int32, Syntax::Proto3), name, sub, not_set],
            oneofs: vec![Oneof {
                name: "choice".to_string(),
                ident: NativeIdent::new("Pick_Choice", "crate::test"),
                fields: vec![1, 2, 3],
            }],
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
    fn test_oneof_enum_variants() {
        let file = empty_file(Syntax::Proto3);
        let files = FileSet::default();
        let ctx = context(&file, &files);
        let message = pick();
        let code = generate_enum(&ctx, &message, &message.oneofs[0])
            .unwrap()
            .to_string();

        assert!(code.contains("pub enum Pick_Choice"));
        assert!(code.contains("# [default] NotSet"));
        assert!(code.contains("Name (String)"));
        assert!(code.contains("Sub (Box < Sub >)"));
        assert!(code.contains("NotSet_ (i32)"));
        assert!(code.contains("\"bytes,2,opt,name=name,proto3,oneof\""));
    }

    #[test]
    fn test_underscore_member_variants() {
        assert_eq!(variant_ident(&scalar("_1", 5, Kind::Int32, Syntax::Proto3)).to_string(), "X1");
        assert_eq!(variant_ident(&scalar("_", 6, Kind::Int32, Syntax::Proto3)).to_string(), "X");
    }

    #[test]
    fn test_oneof_getters() {
        let file = empty_file(Syntax::Proto3);
        let files = FileSet::default();
        let ctx = context(&file, &files);
        let message = pick();
        let code = generate_getters(&ctx, &message, &message.oneofs[0])
            .unwrap()
            .to_string();

        assert!(code.contains("pub fn get_choice (& self) -> & Pick_Choice"));
        assert!(code.contains("pub fn get_name (& self) -> & str"));
        assert!(code.contains("Pick_Choice :: Name (x) => x . as_str ()"));
        assert!(code.contains("pub fn get_sub (& self) -> Option < & Sub >"));
        assert!(code.contains("_ => None"));
        assert!(code.contains("pub fn get_not_set (& self) -> i32"));
    }

    #[test]
    fn test_struct_member() {
        let message = pick();
        let code = struct_member(&message.oneofs[0]).to_string();
        assert_eq!(code, "# [protobuf (oneof = \"choice\")] pub choice : Pick_Choice");
    }
}
