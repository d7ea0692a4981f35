//! Enum code generation
//!
//! Enums are open: the generated type is a transparent `i32` newtype with
//! one associated constant per declared value, so unknown numbers received
//! on the wire survive a round trip.

use super::{allow_lints, deprecated_attr, ident, Context};
use crate::model::{Enum, Syntax};
use crate::GeneratorError;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use std::collections::HashSet;

/// Generate the type, value tables and impls for one enum
pub fn generate(ctx: &Context<'_>, enum_decl: &Enum) -> Result<TokenStream, GeneratorError> {
    let runtime = &ctx.runtime;
    let name = ident(&enum_decl.ident.name);
    let name_str = enum_decl.ident.name.as_str();
    let name_table = format_ident!("{}_name", enum_decl.ident.name);
    let value_table = format_ident!("{}_value", enum_decl.ident.name);
    let allow = allow_lints();
    let doc = ctx.doc(&enum_decl.path);
    let deprecated = deprecated_attr(enum_decl.deprecated);

    let mut seen = HashSet::new();
    let mut constants = Vec::with_capacity(enum_decl.values.len());
    let mut names = Vec::with_capacity(enum_decl.values.len());
    let mut values = Vec::with_capacity(enum_decl.values.len());
    for value in &enum_decl.values {
        let const_name = ident(&value.name);
        let number = value.number;
        let value_name = value.name.as_str();
        let duplicate = !seen.insert(number);

        let value_doc = ctx.doc(&value.path);
        let value_deprecated = deprecated_attr(value.deprecated);
        let duplicate_doc = if duplicate {
            quote! { #[doc = " Duplicate value"] }
        } else {
            TokenStream::new()
        };
        constants.push(quote! {
            #value_doc
            #duplicate_doc
            #value_deprecated
            pub const #const_name: #name = #name(#number);
        });
        names.push(quote! {
            #runtime::EnumName { number: #number, name: #value_name, duplicate: #duplicate }
        });
        values.push(quote! { (#value_name, #number) });
    }

    let closed_accessors = if enum_decl.syntax == Syntax::Proto3 {
        TokenStream::new()
    } else {
        quote! {
            /// The value wrapped for presence-tracking fields
            pub fn boxed(self) -> Option<Self> {
                Some(self)
            }

            /// Decode from JSON, accepting the value name or number
            pub fn unmarshal_json(&mut self, data: &[u8]) -> Result<(), #runtime::Error> {
                let value = #runtime::unmarshal_json_enum(#value_table, data, #name_str)?;
                *self = #name(value);
                Ok(())
            }
        }
    };
    let descriptor = ctx.descriptor_accessor("enum_descriptor", &enum_decl.path);
    let well_known = ctx.well_known_impl(&enum_decl.full_name, &enum_decl.name, &name);

    Ok(quote! {
        #doc
        #deprecated
        #allow
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct #name(pub i32);

        #allow
        #[allow(deprecated)]
        impl #name {
            #(#constants)*

            #closed_accessors

            #descriptor
        }

        #allow
        pub static #name_table: &[#runtime::EnumName] = &[#(#names),*];

        #allow
        pub static #value_table: &[(&str, i32)] = &[#(#values),*];

        #[allow(deprecated)]
        impl ::core::fmt::Display for #name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&#runtime::enum_name(#name_table, self.0))
            }
        }

        #well_known
    })
}
