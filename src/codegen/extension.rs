//! Extension descriptor generation

use super::{allow_lints, deprecated_attr, parse_type, tag, Context};
use crate::model::Extension;
use crate::types::map_field_type;
use crate::GeneratorError;
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::Ident;

/// Name of the static holding an extension's descriptor
///
/// `E_<Parent>_<Ext>` for extensions declared inside a message, `E_<Ext>`
/// for file-level ones.
pub fn extension_var(ext: &Extension) -> Ident {
    match &ext.parent {
        Some(parent) => format_ident!("E_{}_{}", parent.name, ext.field.camel_name),
        None => format_ident!("E_{}", ext.field.camel_name),
    }
}

/// Name recorded in the descriptor
///
/// The `message_set_extension` of a message-set element is named after the
/// message declaring it rather than after the field.
pub fn registered_name(ext: &Extension) -> &str {
    if ext.is_message_set_element() {
        if let Some(parent) = &ext.parent_full_name {
            return parent;
        }
    }
    &ext.full_name
}

/// Generate the `ExtensionDesc` static for one extension
pub fn generate(ctx: &Context<'_>, ext: &Extension) -> Result<TokenStream, GeneratorError> {
    let runtime = &ctx.runtime;
    let var = extension_var(ext);
    let extended = ctx.native_type(&ext.extended.ident)?;
    let value_type = parse_type(&map_field_type(&ext.field, ctx.module()).field_type())?;
    let number = ext.field.number;
    let name = registered_name(ext);
    let tag = tag::encode_tag(&ext.field)?;
    let filename = ctx.file.path.as_str();
    let doc = ctx.doc(&ext.field.path);
    let deprecated = deprecated_attr(ext.field.deprecated);
    let allow = allow_lints();

    Ok(quote! {
        #doc
        #deprecated
        #allow
        pub static #var: #runtime::ExtensionDesc<#extended, #value_type> =
            #runtime::ExtensionDesc::new(#number, #name, #tag, #filename);
    })
}
