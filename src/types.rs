//! Protobuf to Rust type mapping
//!
//! This module decides the storage type of every generated struct field and
//! whether presence is tracked with an `Option<..>` wrapper.

use crate::model::{Cardinality, Field, Kind, Syntax};

/// Rust type information for a protobuf field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedType {
    /// The Rust type, without the presence wrapper
    pub rust_type: String,
    /// Whether the struct field wraps the type in `Option<..>`
    pub indirect: bool,
}

impl MappedType {
    /// The type of the struct field holding this value
    pub fn field_type(&self) -> String {
        if self.indirect {
            format!("Option<{}>", self.rust_type)
        } else {
            self.rust_type.clone()
        }
    }
}

/// Map a field to its storage type, as seen from code in `from_module`
pub fn map_field_type(field: &Field, from_module: &str) -> MappedType {
    if let Some(entry) = field.map_entry() {
        let key = map_field_type(&entry.key, from_module);
        let value = map_field_type(&entry.value, from_module);
        return MappedType {
            rust_type: format!(
                "::std::collections::HashMap<{}, {}>",
                key.rust_type, value.rust_type
            ),
            indirect: false,
        };
    }

    let repeated = field.cardinality == Cardinality::Repeated;
    let (rust_type, mut indirect) = match &field.kind {
        Kind::Bytes => ("Vec<u8>".to_string(), false),
        Kind::Message(m) | Kind::Group(m) => {
            let ident = m.ident.qualified(from_module);
            if repeated {
                (ident, false)
            } else {
                (format!("Option<Box<{}>>", ident), false)
            }
        }
        kind => (element_type(kind, from_module), true),
    };

    let rust_type = if repeated {
        indirect = false;
        format!("Vec<{}>", rust_type)
    } else {
        rust_type
    };

    if field.syntax == Syntax::Proto3 {
        indirect = false;
    }

    MappedType {
        rust_type,
        indirect,
    }
}

/// The Rust type of a single value of `kind`
///
/// Messages map to their bare type here; callers add boxing where a
/// singular field needs it.
pub fn element_type(kind: &Kind, from_module: &str) -> String {
    match kind {
        Kind::Bool => "bool".to_string(),
        Kind::Int32 | Kind::Sint32 | Kind::Sfixed32 => "i32".to_string(),
        Kind::Uint32 | Kind::Fixed32 => "u32".to_string(),
        Kind::Int64 | Kind::Sint64 | Kind::Sfixed64 => "i64".to_string(),
        Kind::Uint64 | Kind::Fixed64 => "u64".to_string(),
        Kind::Float => "f32".to_string(),
        Kind::Double => "f64".to_string(),
        Kind::String => "String".to_string(),
        Kind::Bytes => "Vec<u8>".to_string(),
        Kind::Enum(e) => e.ident.qualified(from_module),
        Kind::Message(m) | Kind::Group(m) => m.ident.qualified(from_module),
    }
}
