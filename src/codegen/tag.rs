//! Wire-format tag encoding
//!
//! Every generated field carries a tag string such as
//! `varint,1,opt,name=id,proto3` that the runtime parses to drive
//! marshaling. Token order is fixed and `def=` always comes last, since
//! commas inside a default value are not escaped.

use super::defaults;
use crate::model::{Cardinality, Field, Kind, Syntax};
use crate::GeneratorError;

/// Wire type token for a field kind
pub fn wire_type(kind: &Kind) -> &'static str {
    match kind {
        Kind::Bool
        | Kind::Enum(_)
        | Kind::Int32
        | Kind::Uint32
        | Kind::Int64
        | Kind::Uint64 => "varint",
        Kind::Sint32 => "zigzag32",
        Kind::Sint64 => "zigzag64",
        Kind::Sfixed32 | Kind::Fixed32 | Kind::Float => "fixed32",
        Kind::Sfixed64 | Kind::Fixed64 | Kind::Double => "fixed64",
        Kind::String | Kind::Bytes | Kind::Message(_) => "bytes",
        Kind::Group(_) => "group",
    }
}

/// Cardinality token
pub fn cardinality_token(cardinality: Cardinality) -> &'static str {
    match cardinality {
        Cardinality::Optional => "opt",
        Cardinality::Required => "req",
        Cardinality::Repeated => "rep",
    }
}

/// Name written into the tag
///
/// The descriptor name of a group field is lowercased, so the original
/// capitalization is taken from the group's message type.
pub fn wire_name(field: &Field) -> &str {
    match &field.kind {
        Kind::Group(m) => &m.name,
        _ => &field.name,
    }
}

/// Build the tag string for a field
///
/// Fails only for a bytes default that is not valid UTF-8, which a tag
/// string cannot carry.
pub fn encode_tag(field: &Field) -> Result<String, GeneratorError> {
    let mut tag: Vec<String> = Vec::with_capacity(10);

    tag.push(wire_type(&field.kind).to_string());
    tag.push(field.number.to_string());
    tag.push(cardinality_token(field.cardinality).to_string());
    if field.packed {
        tag.push("packed".to_string());
    }

    let name = wire_name(field);
    tag.push(format!("name={}", name));
    if !field.json_name.is_empty() && field.json_name != name {
        tag.push(format!("json={}", field.json_name));
    }

    if field.syntax == Syntax::Proto3 {
        tag.push("proto3".to_string());
    }
    if let Kind::Enum(e) = &field.kind {
        tag.push(format!("enum={}", e.registry_name));
    }
    if field.oneof.is_some() {
        tag.push("oneof".to_string());
    }

    if let Some(def) = defaults::encoded_default(field)? {
        tag.push(format!("def={}", def));
    }

    Ok(tag.join(","))
}

/// The `json` attribute value of a struct field
pub fn json_tag(field: &Field) -> String {
    format!("{},omitempty", field.name)
}
