//! Request resolution
//!
//! Builds the [`model`](crate::model) from the raw `FileDescriptorProto`s of a
//! `CodeGeneratorRequest`. Resolution happens in two passes: the first pass
//! indexes every message and enum of every file by fully-qualified name, the
//! second pass walks each file and resolves field types against that index.

use crate::model::{
    Cardinality, Enum, EnumRef, EnumValue, Extension, Field, File, FileSet, Import, Kind,
    MapEntry, Message, MessageRef, NativeIdent, Oneof, Syntax,
};
use crate::options::GeneratorOptions;
use crate::GeneratorError;
use heck::ToUpperCamelCase;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

// Field numbers of the descriptor messages, used to build source paths.
const FILE_MESSAGE_TYPE: i32 = 4;
const FILE_ENUM_TYPE: i32 = 5;
const FILE_EXTENSION: i32 = 7;
const MESSAGE_FIELD: i32 = 2;
const MESSAGE_NESTED_TYPE: i32 = 3;
const MESSAGE_ENUM_TYPE: i32 = 4;
const MESSAGE_EXTENSION: i32 = 6;
const ENUM_VALUE: i32 = 2;

/// An indexed type, keyed by its dotted full name
#[derive(Debug)]
enum TypeEntry {
    Message {
        ident: NativeIdent,
        full_name: String,
        name: String,
        message_set_wire_format: bool,
        map_entry: Option<(FieldDescriptorProto, FieldDescriptorProto)>,
        syntax: Syntax,
    },
    Enum {
        ident: NativeIdent,
        registry_name: String,
        values: Vec<(String, i32)>,
    },
}

/// Per-file resolution context
struct Scope<'s> {
    package: &'s str,
    module: &'s str,
    syntax: Syntax,
}

/// Resolve every file of a request
pub fn resolve(
    files: &[FileDescriptorProto],
    options: &GeneratorOptions,
) -> Result<FileSet, GeneratorError> {
    let resolver = Resolver::index(files, options);

    let mut set = FileSet::default();
    for file in files {
        set.insert(resolver.resolve_file(file)?);
    }

    debug!(files = set.len(), types = resolver.types.len(), "resolved request");
    Ok(set)
}

/// Cross-file type index
struct Resolver<'a> {
    options: &'a GeneratorOptions,
    types: HashMap<String, TypeEntry>,
    /// (module, name) of every type identifier, used to keep oneof names unique
    native_names: HashSet<(String, String)>,
}

impl<'a> Resolver<'a> {
    fn index(files: &[FileDescriptorProto], options: &'a GeneratorOptions) -> Self {
        let mut resolver = Self {
            options,
            types: HashMap::new(),
            native_names: HashSet::new(),
        };

        for file in files {
            let package = file.package();
            let module = options.module_for_package(package);
            let syntax = Syntax::from_descriptor(file.syntax());
            let prefix = dotted_prefix(package);
            let scope = Scope {
                package,
                module: &module,
                syntax,
            };

            for message in &file.message_type {
                resolver.index_message(&scope, message, &prefix, None);
            }
            for enum_desc in &file.enum_type {
                resolver.index_enum(&scope, enum_desc, &prefix, None);
            }
        }

        resolver
    }

    fn index_message(
        &mut self,
        scope: &Scope<'_>,
        message: &DescriptorProto,
        prefix: &str,
        parent_ident: Option<&str>,
    ) {
        let full = format!("{}.{}", prefix, message.name());
        let ident_name = nested_ident(parent_ident, message.name());
        let options = message.options.as_ref();

        let map_entry = if options.map_or(false, |o| o.map_entry()) {
            let key = message.field.iter().find(|f| f.number() == 1).cloned();
            let value = message.field.iter().find(|f| f.number() == 2).cloned();
            key.zip(value)
        } else {
            None
        };

        for nested in &message.nested_type {
            self.index_message(scope, nested, &full, Some(&ident_name));
        }
        for enum_desc in &message.enum_type {
            self.index_enum(scope, enum_desc, &full, Some(&ident_name));
        }

        trace!(name = %full, "indexed message");
        self.native_names
            .insert((scope.module.to_string(), ident_name.clone()));
        self.types.insert(
            full.clone(),
            TypeEntry::Message {
                ident: NativeIdent::new(ident_name, scope.module),
                full_name: strip_dot(&full),
                name: message.name().to_string(),
                message_set_wire_format: options.map_or(false, |o| o.message_set_wire_format()),
                map_entry,
                syntax: scope.syntax,
            },
        );
    }

    fn index_enum(
        &mut self,
        scope: &Scope<'_>,
        enum_desc: &EnumDescriptorProto,
        prefix: &str,
        parent_ident: Option<&str>,
    ) {
        let full = format!("{}.{}", prefix, enum_desc.name());
        let ident_name = nested_ident(parent_ident, enum_desc.name());

        trace!(name = %full, "indexed enum");
        self.native_names
            .insert((scope.module.to_string(), ident_name.clone()));
        self.types.insert(
            full.clone(),
            TypeEntry::Enum {
                registry_name: format!("{}.{}", scope.package, ident_name),
                ident: NativeIdent::new(ident_name, scope.module),
                values: enum_desc
                    .value
                    .iter()
                    .map(|v| (v.name().to_string(), v.number()))
                    .collect(),
            },
        );
    }

    fn resolve_file(&self, file: &FileDescriptorProto) -> Result<File, GeneratorError> {
        let package = file.package();
        let module = self.options.module_for_package(package);
        let scope = Scope {
            package,
            module: &module,
            syntax: Syntax::from_descriptor(file.syntax()),
        };
        let prefix = dotted_prefix(package);

        let messages = file
            .message_type
            .iter()
            .enumerate()
            .map(|(i, m)| self.resolve_message(&scope, m, &prefix, None, vec![FILE_MESSAGE_TYPE, i as i32]))
            .collect::<Result<Vec<_>, _>>()?;

        let enums = file
            .enum_type
            .iter()
            .enumerate()
            .map(|(i, e)| self.resolve_enum(&scope, e, &prefix, None, vec![FILE_ENUM_TYPE, i as i32]))
            .collect();

        let extensions = file
            .extension
            .iter()
            .enumerate()
            .map(|(i, x)| {
                self.resolve_extension(&scope, x, &prefix, None, vec![FILE_EXTENSION, i as i32])
            })
            .collect::<Result<Vec<_>, _>>()?;

        let imports = file
            .dependency
            .iter()
            .enumerate()
            .map(|(i, path)| Import {
                path: path.clone(),
                public: file.public_dependency.contains(&(i as i32)),
            })
            .collect();

        let mut comments = HashMap::new();
        if let Some(info) = &file.source_code_info {
            for location in &info.location {
                if let Some(leading) = &location.leading_comments {
                    comments
                        .entry(location.path.clone())
                        .or_insert_with(|| leading.clone());
                }
            }
        }

        Ok(File {
            path: file.name().to_string(),
            package: package.to_string(),
            syntax: scope.syntax,
            module: module.clone(),
            deprecated: file.options.as_ref().map_or(false, |o| o.deprecated()),
            messages,
            enums,
            extensions,
            imports,
            comments,
            proto: file.clone(),
        })
    }

    fn resolve_message(
        &self,
        scope: &Scope<'_>,
        message: &DescriptorProto,
        prefix: &str,
        parent_ident: Option<&str>,
        path: Vec<i32>,
    ) -> Result<Message, GeneratorError> {
        let full = format!("{}.{}", prefix, message.name());
        let ident = NativeIdent::new(nested_ident(parent_ident, message.name()), scope.module);
        let options = message.options.as_ref();

        // Oneofs holding a single proto3 `optional` field are synthetic
        let mut oneof_index = HashMap::new();
        let mut oneofs = Vec::new();
        for (i, decl) in message.oneof_decl.iter().enumerate() {
            let synthetic = message
                .field
                .iter()
                .any(|f| f.oneof_index == Some(i as i32) && f.proto3_optional());
            if synthetic {
                continue;
            }
            oneof_index.insert(i as i32, oneofs.len());
            oneofs.push(Oneof {
                name: decl.name().to_string(),
                ident: NativeIdent::new(
                    self.unique_name(
                        scope.module,
                        format!("{}_{}", ident.name, camel_name_of(decl.name())),
                    ),
                    scope.module,
                ),
                fields: Vec::new(),
            });
        }

        let mut fields = Vec::with_capacity(message.field.len());
        for (i, field) in message.field.iter().enumerate() {
            let oneof = field
                .oneof_index
                .and_then(|index| oneof_index.get(&index).copied());
            if let Some(o) = oneof {
                oneofs[o].fields.push(i);
            }
            let mut field_path = path.clone();
            field_path.extend([MESSAGE_FIELD, i as i32]);
            fields.push(self.resolve_field(scope.syntax, field, field_path, oneof)?);
        }

        let messages = message
            .nested_type
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let mut nested_path = path.clone();
                nested_path.extend([MESSAGE_NESTED_TYPE, i as i32]);
                self.resolve_message(scope, m, &full, Some(&ident.name), nested_path)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let enums = message
            .enum_type
            .iter()
            .enumerate()
            .map(|(i, e)| {
                let mut enum_path = path.clone();
                enum_path.extend([MESSAGE_ENUM_TYPE, i as i32]);
                self.resolve_enum(scope, e, &full, Some(&ident.name), enum_path)
            })
            .collect();

        let extensions = message
            .extension
            .iter()
            .enumerate()
            .map(|(i, x)| {
                let mut ext_path = path.clone();
                ext_path.extend([MESSAGE_EXTENSION, i as i32]);
                self.resolve_extension(scope, x, &full, Some(&ident), ext_path)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Message {
            name: message.name().to_string(),
            full_name: strip_dot(&full),
            ident,
            fields,
            oneofs,
            messages,
            enums,
            extensions,
            extension_ranges: message
                .extension_range
                .iter()
                .map(|r| (r.start(), r.end()))
                .collect(),
            deprecated: options.map_or(false, |o| o.deprecated()),
            message_set_wire_format: options.map_or(false, |o| o.message_set_wire_format()),
            map_entry: options.map_or(false, |o| o.map_entry()),
            path,
        })
    }

    fn resolve_enum(
        &self,
        scope: &Scope<'_>,
        enum_desc: &EnumDescriptorProto,
        prefix: &str,
        parent_ident: Option<&str>,
        path: Vec<i32>,
    ) -> Enum {
        let ident_name = nested_ident(parent_ident, enum_desc.name());
        let values = enum_desc
            .value
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let mut value_path = path.clone();
                value_path.extend([ENUM_VALUE, i as i32]);
                EnumValue {
                    name: v.name().to_string(),
                    number: v.number(),
                    deprecated: v.options.as_ref().map_or(false, |o| o.deprecated()),
                    path: value_path,
                }
            })
            .collect();

        Enum {
            name: enum_desc.name().to_string(),
            full_name: strip_dot(&format!("{}.{}", prefix, enum_desc.name())),
            registry_name: format!("{}.{}", scope.package, ident_name),
            ident: NativeIdent::new(ident_name, scope.module),
            values,
            deprecated: enum_desc.options.as_ref().map_or(false, |o| o.deprecated()),
            syntax: scope.syntax,
            path,
        }
    }

    fn resolve_extension(
        &self,
        scope: &Scope<'_>,
        field: &FieldDescriptorProto,
        prefix: &str,
        parent: Option<&NativeIdent>,
        path: Vec<i32>,
    ) -> Result<Extension, GeneratorError> {
        let extended = self.message_ref(field.extendee())?;
        let parent_full_name = parent.map(|_| strip_dot(prefix));
        Ok(Extension {
            field: self.resolve_field(scope.syntax, field, path, None)?,
            full_name: strip_dot(&format!("{}.{}", prefix, field.name())),
            extended,
            parent: parent.cloned(),
            parent_full_name,
        })
    }

    fn resolve_field(
        &self,
        syntax: Syntax,
        field: &FieldDescriptorProto,
        path: Vec<i32>,
        oneof: Option<usize>,
    ) -> Result<Field, GeneratorError> {
        let kind = self.resolve_kind(field)?;
        let cardinality = match field.label() {
            Label::Optional => Cardinality::Optional,
            Label::Required => Cardinality::Required,
            Label::Repeated => Cardinality::Repeated,
        };
        let options = field.options.as_ref();
        let packed = cardinality == Cardinality::Repeated
            && kind.is_packable()
            && options
                .and_then(|o| o.packed)
                .unwrap_or(syntax == Syntax::Proto3);

        Ok(Field {
            name: field.name().to_string(),
            camel_name: camel_name_of(field.name()),
            number: field.number(),
            json_name: field
                .json_name
                .clone()
                .unwrap_or_else(|| json_name_of(field.name())),
            kind,
            cardinality,
            packed,
            oneof,
            default_value: field.default_value.clone(),
            deprecated: options.map_or(false, |o| o.deprecated()),
            syntax,
            path,
        })
    }

    fn resolve_kind(&self, field: &FieldDescriptorProto) -> Result<Kind, GeneratorError> {
        Ok(match field.r#type() {
            Type::Double => Kind::Double,
            Type::Float => Kind::Float,
            Type::Int64 => Kind::Int64,
            Type::Uint64 => Kind::Uint64,
            Type::Int32 => Kind::Int32,
            Type::Fixed64 => Kind::Fixed64,
            Type::Fixed32 => Kind::Fixed32,
            Type::Bool => Kind::Bool,
            Type::String => Kind::String,
            Type::Group => Kind::Group(self.message_ref(field.type_name())?),
            Type::Message => Kind::Message(self.message_ref(field.type_name())?),
            Type::Bytes => Kind::Bytes,
            Type::Uint32 => Kind::Uint32,
            Type::Enum => Kind::Enum(self.enum_ref(field.type_name())?),
            Type::Sfixed32 => Kind::Sfixed32,
            Type::Sfixed64 => Kind::Sfixed64,
            Type::Sint32 => Kind::Sint32,
            Type::Sint64 => Kind::Sint64,
        })
    }

    fn message_ref(&self, type_name: &str) -> Result<MessageRef, GeneratorError> {
        match self.types.get(type_name) {
            Some(TypeEntry::Message {
                ident,
                full_name,
                name,
                message_set_wire_format,
                map_entry,
                syntax,
            }) => {
                let map_entry = match map_entry {
                    Some((key, value)) => Some(Box::new(MapEntry {
                        key: self.resolve_field(*syntax, key, Vec::new(), None)?,
                        value: self.resolve_field(*syntax, value, Vec::new(), None)?,
                    })),
                    None => None,
                };
                Ok(MessageRef {
                    ident: ident.clone(),
                    full_name: full_name.clone(),
                    name: name.clone(),
                    message_set_wire_format: *message_set_wire_format,
                    map_entry,
                })
            }
            _ => Err(GeneratorError::UnknownType(type_name.to_string())),
        }
    }

    fn enum_ref(&self, type_name: &str) -> Result<EnumRef, GeneratorError> {
        match self.types.get(type_name) {
            Some(TypeEntry::Enum {
                ident,
                registry_name,
                values,
            }) => Ok(EnumRef {
                ident: ident.clone(),
                registry_name: registry_name.clone(),
                values: values.clone(),
            }),
            _ => Err(GeneratorError::UnknownType(type_name.to_string())),
        }
    }

    /// Append underscores until `name` does not clash with a type in `module`
    fn unique_name(&self, module: &str, mut name: String) -> String {
        while self
            .native_names
            .contains(&(module.to_string(), name.clone()))
        {
            name.push('_');
        }
        name
    }
}

/// `.pkg` for a package, empty for the root namespace
fn dotted_prefix(package: &str) -> String {
    if package.is_empty() {
        String::new()
    } else {
        format!(".{}", package)
    }
}

fn strip_dot(full: &str) -> String {
    full.trim_start_matches('.').to_string()
}

/// Native name of a (possibly nested) type: `Outer_Inner`
fn nested_ident(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) => format!("{}_{}", parent, name),
        None => name.to_string(),
    }
}

/// Upper camel case name; a leading underscore becomes `X` so the result is never empty
pub fn camel_name_of(name: &str) -> String {
    let camel = name.to_upper_camel_case();
    if name.starts_with('_') {
        format!("X{}", camel)
    } else {
        camel
    }
}

/// JSON name as protoc computes it: underscores dropped, next letter uppercased
pub fn json_name_of(name: &str) -> String {
    let mut json = String::with_capacity(name.len());
    let mut capitalize_next = false;
    for c in name.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            json.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            json.push(c);
        }
    }
    json
}
