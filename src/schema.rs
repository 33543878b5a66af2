//! The linked type graph.
//!
//! A [`Schema`] is produced by the linker in one piece and never mutated
//! afterwards. Type references inside it are fully qualified names without a
//! leading dot; [`Schema::get`] accepts either form.

use crate::ast::{DataType, Label, Location, Reserved, ScalarType, Syntax, TagRange};
use crate::options::ResolvedOption;
use crate::value::Value;
use crate::wire::WireType;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Schema {
    files: Vec<SchemaFile>,
    types: Vec<Type>,
    index: HashMap<String, usize>,
}

impl Schema {
    pub(crate) fn new(files: Vec<SchemaFile>, types: Vec<Type>) -> Self {
        let index = types.iter().enumerate().map(|(i, t)| (t.name().to_string(), i)).collect();
        Schema { files, types, index }
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.index.get(name.trim_start_matches('.')).map(|&i| &self.types[i])
    }

    pub fn message(&self, name: &str) -> Option<&MessageType> {
        self.get(name).and_then(Type::as_message)
    }

    pub fn enum_type(&self, name: &str) -> Option<&EnumType> {
        self.get(name).and_then(Type::as_enum)
    }

    pub fn service(&self, name: &str) -> Option<&ServiceType> {
        self.get(name).and_then(Type::as_service)
    }

    /// Every type, parents before their nested types.
    pub fn types(&self) -> &[Type] {
        &self.types
    }

    pub fn files(&self) -> &[SchemaFile] {
        &self.files
    }

    pub fn file(&self, path: &str) -> Option<&SchemaFile> {
        self.files.iter().find(|f| f.path == path)
    }

    /// Extension field by fully qualified name, e.g. `pkg.my_option`.
    pub fn extension(&self, name: &str) -> Option<&Field> {
        let name = name.trim_start_matches('.');
        self.types
            .iter()
            .filter_map(Type::as_message)
            .flat_map(|m| m.extensions.iter())
            .find(|f| f.full_name == name)
    }
}

/// File-level facts that survive linking.
#[derive(Debug, Clone)]
pub struct SchemaFile {
    pub path: String,
    pub package: Option<String>,
    pub syntax: Syntax,
    pub imports: Vec<String>,
    pub public_imports: Vec<String>,
    pub options: Vec<ResolvedOption>,
    /// Fully qualified names of the types declared in this file, nested ones included.
    pub types: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum Type {
    Message(MessageType),
    Enum(EnumType),
    Service(ServiceType),
}

impl Type {
    pub fn name(&self) -> &str {
        match self {
            Type::Message(m) => &m.name,
            Type::Enum(e) => &e.name,
            Type::Service(s) => &s.name,
        }
    }

    /// Path of the declaring file.
    pub fn file(&self) -> &str {
        match self {
            Type::Message(m) => &m.file,
            Type::Enum(e) => &e.file,
            Type::Service(s) => &s.file,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            Type::Message(m) => &m.location,
            Type::Enum(e) => &e.location,
            Type::Service(s) => &s.location,
        }
    }

    pub fn options(&self) -> &[ResolvedOption] {
        match self {
            Type::Message(m) => &m.options,
            Type::Enum(e) => &e.options,
            Type::Service(s) => &s.options,
        }
    }

    pub fn as_message(&self) -> Option<&MessageType> {
        match self {
            Type::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumType> {
        match self {
            Type::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_service(&self) -> Option<&ServiceType> {
        match self {
            Type::Service(s) => Some(s),
            _ => None,
        }
    }

    pub(crate) fn options_mut(&mut self) -> &mut Vec<ResolvedOption> {
        match self {
            Type::Message(m) => &mut m.options,
            Type::Enum(e) => &mut e.options,
            Type::Service(s) => &mut s.options,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MessageType {
    pub name: String,
    pub enclosing: Option<String>,
    pub file: String,
    pub syntax: Syntax,
    pub location: Location,
    pub documentation: String,
    /// Declared fields, in declaration order (oneof members included).
    pub fields: Vec<Field>,
    pub oneofs: Vec<Oneof>,
    /// Fields other declarations attach to this type with `extend`.
    pub extensions: Vec<Field>,
    pub extension_ranges: Vec<TagRange>,
    pub reserved: Vec<Reserved>,
    pub options: Vec<ResolvedOption>,
    /// Synthesized for a `map<K, V>` field.
    pub map_entry: bool,
}

impl MessageType {
    /// Declared field or extension with this number.
    pub fn field(&self, tag: u32) -> Option<&Field> {
        self.all_fields().find(|f| f.tag == tag)
    }

    pub fn field_named(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn all_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().chain(self.extensions.iter())
    }

    pub fn oneof_named(&self, name: &str) -> Option<&Oneof> {
        self.oneofs.iter().find(|o| o.name == name)
    }

    pub fn in_extension_range(&self, tag: u32) -> bool {
        self.extension_ranges.iter().any(|r| r.contains(tag as i64))
    }
}

#[derive(Debug, Clone)]
pub struct Oneof {
    pub name: String,
    pub location: Location,
    pub documentation: String,
    /// Member field numbers.
    pub fields: Vec<u32>,
    pub options: Vec<ResolvedOption>,
}

/// A field after linking.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    /// `pkg.Message.field`, or `pkg.field` for a top-level extension.
    pub full_name: String,
    pub tag: u32,
    /// Singular proto3 fields and oneof members are `Optional`; map fields are `Repeated`.
    pub label: Label,
    pub data_type: DataType,
    pub kind: FieldKind,
    pub packed: bool,
    /// Index into the owning message's `oneofs`.
    pub oneof: Option<usize>,
    pub default: Option<Value>,
    pub json_name: String,
    pub deprecated: bool,
    pub redacted: bool,
    /// Extended message, for extension fields.
    pub extendee: Option<String>,
    pub options: Vec<ResolvedOption>,
    pub location: Location,
    pub documentation: String,
}

impl Field {
    pub fn is_repeated(&self) -> bool {
        self.label == Label::Repeated
    }

    pub fn is_required(&self) -> bool {
        self.label == Label::Required
    }

    pub fn is_map(&self) -> bool {
        matches!(self.kind, FieldKind::Map { .. })
    }

    pub fn is_extension(&self) -> bool {
        self.extendee.is_some()
    }

    pub fn wire_type(&self) -> WireType {
        if self.packed {
            WireType::LengthDelimited
        } else {
            self.kind.wire_type()
        }
    }
}

/// Wire classification of a field's element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar(ScalarType),
    /// `closed` enums (declared in proto2 files) reject undeclared numbers on decode.
    Enum { type_name: String, closed: bool },
    Message(String),
    Map {
        entry: String,
        key: ScalarType,
        value: Box<FieldKind>,
    },
}

impl FieldKind {
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldKind::Scalar(s) => s.wire_type(),
            FieldKind::Enum { .. } => WireType::Varint,
            FieldKind::Message(_) | FieldKind::Map { .. } => WireType::LengthDelimited,
        }
    }

    pub fn is_packable(&self) -> bool {
        match self {
            FieldKind::Scalar(s) => s.is_packable(),
            FieldKind::Enum { .. } => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnumType {
    pub name: String,
    pub enclosing: Option<String>,
    pub file: String,
    pub syntax: Syntax,
    pub location: Location,
    pub documentation: String,
    pub constants: Vec<EnumConstant>,
    pub reserved: Vec<Reserved>,
    pub allow_alias: bool,
    pub options: Vec<ResolvedOption>,
}

impl EnumType {
    /// Proto2 enums are closed: numbers they do not declare are treated as unknown.
    pub fn is_closed(&self) -> bool {
        self.syntax == Syntax::Proto2
    }

    pub fn constant(&self, name: &str) -> Option<&EnumConstant> {
        self.constants.iter().find(|c| c.name == name)
    }

    /// First constant with this number.
    pub fn constant_for(&self, number: i32) -> Option<&EnumConstant> {
        self.constants.iter().find(|c| c.number == number)
    }
}

#[derive(Debug, Clone)]
pub struct EnumConstant {
    pub name: String,
    pub number: i32,
    pub location: Location,
    pub documentation: String,
    pub deprecated: bool,
    pub options: Vec<ResolvedOption>,
}

#[derive(Debug, Clone)]
pub struct ServiceType {
    pub name: String,
    pub file: String,
    pub location: Location,
    pub documentation: String,
    pub rpcs: Vec<Rpc>,
    pub options: Vec<ResolvedOption>,
}

#[derive(Debug, Clone)]
pub struct Rpc {
    pub name: String,
    pub request_type: String,
    pub response_type: String,
    pub request_streaming: bool,
    pub response_streaming: bool,
    pub location: Location,
    pub documentation: String,
    pub options: Vec<ResolvedOption>,
}
