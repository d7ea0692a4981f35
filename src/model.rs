//! Resolved schema model
//!
//! The resolver turns raw `FileDescriptorProto`s into these types once per
//! request; the code generator only ever reads them. Every entity carries its
//! native Rust identifier (name plus module path) so emitters never have to
//! perform cross-file lookups of their own.

use prost_types::FileDescriptorProto;
use std::collections::HashMap;

/// Schema syntax of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// `syntax = "proto2"` (also the default when unset)
    Proto2,
    /// `syntax = "proto3"`
    Proto3,
}

impl Syntax {
    /// Parse the `syntax` field of a file descriptor
    pub fn from_descriptor(value: &str) -> Self {
        match value {
            "proto3" => Syntax::Proto3,
            _ => Syntax::Proto2,
        }
    }
}

/// Field cardinality
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// `optional` (and implicit proto3 singular fields)
    Optional,
    /// `required`
    Required,
    /// `repeated`
    Repeated,
}

/// A Rust identifier together with the module it lives in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeIdent {
    /// Bare identifier, e.g. `Outer_Inner`
    pub name: String,
    /// Module path, e.g. `crate::foo::bar`
    pub module: String,
}

impl NativeIdent {
    /// Create an identifier
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
        }
    }

    /// Render the identifier as seen from code living in `from_module`
    pub fn qualified(&self, from_module: &str) -> String {
        if self.module == from_module || self.module.is_empty() {
            self.name.clone()
        } else {
            format!("{}::{}", self.module, self.name)
        }
    }
}

/// Resolved reference to an enum type
#[derive(Debug, Clone, PartialEq)]
pub struct EnumRef {
    /// Native type
    pub ident: NativeIdent,
    /// Name used with the runtime enum registry: `<package>.<native name>`
    pub registry_name: String,
    /// Declared values in order: (name, number)
    pub values: Vec<(String, i32)>,
}

impl EnumRef {
    /// Name of the first declared value
    pub fn first_value(&self) -> Option<&str> {
        self.values.first().map(|(name, _)| name.as_str())
    }

    /// Number of the value called `name`
    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.values
            .iter()
            .find(|(value, _)| value == name)
            .map(|(_, number)| *number)
    }
}

/// The two synthetic fields of a map-entry message
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    /// Field 1, `key`
    pub key: Field,
    /// Field 2, `value`
    pub value: Field,
}

/// Resolved reference to a message type
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRef {
    /// Native type
    pub ident: NativeIdent,
    /// Fully-qualified schema name without the leading dot
    pub full_name: String,
    /// Short schema name (the group wire name)
    pub name: String,
    /// Whether the message uses the message-set wire format
    pub message_set_wire_format: bool,
    /// Key/value fields when the message is a synthetic map entry
    pub map_entry: Option<Box<MapEntry>>,
}

/// Field kind, a closed set
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    /// `bool`
    Bool,
    /// `int32`
    Int32,
    /// `int64`
    Int64,
    /// `uint32`
    Uint32,
    /// `uint64`
    Uint64,
    /// `sint32`
    Sint32,
    /// `sint64`
    Sint64,
    /// `fixed32`
    Fixed32,
    /// `fixed64`
    Fixed64,
    /// `sfixed32`
    Sfixed32,
    /// `sfixed64`
    Sfixed64,
    /// `float`
    Float,
    /// `double`
    Double,
    /// `string`
    String,
    /// `bytes`
    Bytes,
    /// An enum type
    Enum(EnumRef),
    /// A message type
    Message(MessageRef),
    /// A group (message type with the legacy group encoding)
    Group(MessageRef),
}

impl Kind {
    /// The referenced message for message and group kinds
    pub fn message(&self) -> Option<&MessageRef> {
        match self {
            Kind::Message(m) | Kind::Group(m) => Some(m),
            _ => None,
        }
    }

    /// Whether repeated fields of this kind may use packed encoding
    pub fn is_packable(&self) -> bool {
        !matches!(
            self,
            Kind::String | Kind::Bytes | Kind::Message(_) | Kind::Group(_)
        )
    }
}

/// A message field or extension field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Declared name
    pub name: String,
    /// Upper camel case name used in synthesized identifiers
    pub camel_name: String,
    /// Field number
    pub number: i32,
    /// Kind
    pub kind: Kind,
    /// Cardinality
    pub cardinality: Cardinality,
    /// JSON name
    pub json_name: String,
    /// Whether the field uses packed encoding
    pub packed: bool,
    /// Index into the containing message's oneofs
    pub oneof: Option<usize>,
    /// Declared default value, as written in the descriptor
    pub default_value: Option<String>,
    /// `[deprecated = true]`
    pub deprecated: bool,
    /// Syntax of the declaring file
    pub syntax: Syntax,
    /// Source path within the file descriptor
    pub path: Vec<i32>,
}

impl Field {
    /// Whether this is a map field
    pub fn is_map(&self) -> bool {
        self.cardinality == Cardinality::Repeated
            && self
                .kind
                .message()
                .map_or(false, |m| m.map_entry.is_some())
    }

    /// The map entry fields when this is a map field
    pub fn map_entry(&self) -> Option<&MapEntry> {
        if self.cardinality != Cardinality::Repeated {
            return None;
        }
        self.kind.message().and_then(|m| m.map_entry.as_deref())
    }
}

/// A oneof declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Oneof {
    /// Declared name
    pub name: String,
    /// Native identifier of the generated sum type
    pub ident: NativeIdent,
    /// Indices of the member fields within the message's field list
    pub fields: Vec<usize>,
}

/// A message declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Declared name
    pub name: String,
    /// Fully-qualified schema name without the leading dot
    pub full_name: String,
    /// Native identifier
    pub ident: NativeIdent,
    /// Fields in declaration order
    pub fields: Vec<Field>,
    /// Real (non-synthetic) oneofs
    pub oneofs: Vec<Oneof>,
    /// Nested messages
    pub messages: Vec<Message>,
    /// Nested enums
    pub enums: Vec<Enum>,
    /// Extensions declared inside this message
    pub extensions: Vec<Extension>,
    /// Extension ranges as (start, exclusive end)
    pub extension_ranges: Vec<(i32, i32)>,
    /// `option deprecated = true`
    pub deprecated: bool,
    /// `option message_set_wire_format = true`
    pub message_set_wire_format: bool,
    /// Synthetic map entry
    pub map_entry: bool,
    /// Source path within the file descriptor
    pub path: Vec<i32>,
}

/// A declared enum value
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    /// Declared name
    pub name: String,
    /// Number
    pub number: i32,
    /// `[deprecated = true]`
    pub deprecated: bool,
    /// Source path within the file descriptor
    pub path: Vec<i32>,
}

/// An enum declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Enum {
    /// Declared name
    pub name: String,
    /// Fully-qualified schema name without the leading dot
    pub full_name: String,
    /// Native identifier
    pub ident: NativeIdent,
    /// Runtime enum registry name
    pub registry_name: String,
    /// Values in declaration order
    pub values: Vec<EnumValue>,
    /// `option deprecated = true`
    pub deprecated: bool,
    /// Syntax of the declaring file
    pub syntax: Syntax,
    /// Source path within the file descriptor
    pub path: Vec<i32>,
}

/// An extension declaration
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    /// The extension field itself
    pub field: Field,
    /// Fully-qualified schema name without the leading dot
    pub full_name: String,
    /// The message being extended
    pub extended: MessageRef,
    /// Native identifier of the message the extension is declared in
    pub parent: Option<NativeIdent>,
    /// Full name of the message the extension is declared in
    pub parent_full_name: Option<String>,
}

impl Extension {
    /// Whether this is the singular `message_set_extension` of a message-set element
    pub fn is_message_set_element(&self) -> bool {
        self.parent.is_some()
            && self.extended.message_set_wire_format
            && self.field.name == "message_set_extension"
    }
}

/// An import of another schema file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Path of the imported file
    pub path: String,
    /// `import public`
    pub public: bool,
}

/// One schema compilation unit
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    /// Path relative to the source root, e.g. `foo/bar.proto`
    pub path: String,
    /// Declared package
    pub package: String,
    /// Syntax
    pub syntax: Syntax,
    /// Module path generated code for this file lives in
    pub module: String,
    /// `option deprecated = true`
    pub deprecated: bool,
    /// Top-level messages
    pub messages: Vec<Message>,
    /// Top-level enums
    pub enums: Vec<Enum>,
    /// Top-level extensions
    pub extensions: Vec<Extension>,
    /// Imports in declaration order
    pub imports: Vec<Import>,
    /// Leading comments keyed by source path
    pub comments: HashMap<Vec<i32>, String>,
    /// The descriptor this file was resolved from
    pub proto: FileDescriptorProto,
}

/// All files of a request, addressable by path
#[derive(Debug, Default)]
pub struct FileSet {
    files: HashMap<String, File>,
}

impl FileSet {
    /// Add a file
    pub fn insert(&mut self, file: File) {
        self.files.insert(file.path.clone(), file);
    }

    /// Look up a file by path
    pub fn get(&self, path: &str) -> Option<&File> {
        self.files.get(path)
    }

    /// Number of files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}
