//! Element tree for schema source: one [`ProtoFile`] per parsed file.
//!
//! Elements are unlinked. Type names are kept as written (`Foo`, `.pkg.Foo`,
//! `Outer.Inner`); the linker resolves them. Nested declarations carry their
//! enclosing types as a `qualified_name` prefix but not the package.

use crate::wire::WireType;
use std::fmt;

/// Where a declaration appears: file path plus 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Location {
    pub path: String,
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(path: impl Into<String>, line: usize, column: usize) -> Self {
        Location {
            path: path.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Syntax {
    #[default]
    Proto2,
    Proto3,
}

/// One parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoFile {
    pub path: String,
    pub package: Option<String>,
    pub syntax: Syntax,
    /// Private (and weak) imports, in declaration order.
    pub imports: Vec<String>,
    pub public_imports: Vec<String>,
    /// Where each import statement was written, keyed by imported path.
    pub import_locations: Vec<(String, Location)>,
    pub types: Vec<TypeElement>,
    pub services: Vec<ServiceElement>,
    pub extends: Vec<ExtendElement>,
    pub options: Vec<OptionElement>,
}

impl ProtoFile {
    pub fn new(path: impl Into<String>) -> Self {
        ProtoFile {
            path: path.into(),
            package: None,
            syntax: Syntax::Proto2,
            imports: Vec::new(),
            public_imports: Vec::new(),
            import_locations: Vec::new(),
            types: Vec::new(),
            services: Vec::new(),
            extends: Vec::new(),
            options: Vec::new(),
        }
    }

    /// All imports, public ones included.
    pub fn all_imports(&self) -> impl Iterator<Item = &str> {
        self.public_imports.iter().chain(self.imports.iter()).map(String::as_str)
    }

    /// Location of the statement importing `path`; the top of the file when unknown.
    pub fn import_location(&self, path: &str) -> Location {
        self.import_locations
            .iter()
            .find(|(p, _)| p == path)
            .map(|(_, at)| at.clone())
            .unwrap_or_else(|| Location::new(self.path.as_str(), 1, 1))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeElement {
    Message(MessageElement),
    Enum(EnumElement),
}

impl TypeElement {
    pub fn name(&self) -> &str {
        match self {
            TypeElement::Message(m) => &m.name,
            TypeElement::Enum(e) => &e.name,
        }
    }

    pub fn qualified_name(&self) -> &str {
        match self {
            TypeElement::Message(m) => &m.qualified_name,
            TypeElement::Enum(e) => &e.qualified_name,
        }
    }

    pub fn location(&self) -> &Location {
        match self {
            TypeElement::Message(m) => &m.location,
            TypeElement::Enum(e) => &e.location,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageElement {
    pub location: Location,
    pub name: String,
    /// Name prefixed by enclosing message names, without package (`Outer.Inner`).
    pub qualified_name: String,
    pub documentation: String,
    pub fields: Vec<FieldElement>,
    pub oneofs: Vec<OneofElement>,
    pub nested: Vec<TypeElement>,
    pub extends: Vec<ExtendElement>,
    pub options: Vec<OptionElement>,
    pub reserveds: Vec<ReservedElement>,
    pub extensions: Vec<ExtensionsElement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Optional,
    Required,
    Repeated,
}

impl Label {
    pub fn keyword(self) -> &'static str {
        match self {
            Label::Optional => "optional",
            Label::Required => "required",
            Label::Repeated => "repeated",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldElement {
    pub location: Location,
    /// Absent for proto3 singular fields, map fields and oneof members.
    pub label: Option<Label>,
    pub data_type: DataType,
    pub name: String,
    pub tag: u32,
    /// Value of the `default` pseudo-option.
    pub default: Option<OptionValue>,
    /// Value of the `json_name` pseudo-option.
    pub json_name: Option<String>,
    pub options: Vec<OptionElement>,
    pub documentation: String,
}

impl FieldElement {
    pub fn is_deprecated(&self) -> bool {
        option_is_true(&self.options, "deprecated")
    }

    /// `Some` only when `packed` is set explicitly.
    pub fn packed(&self) -> Option<bool> {
        find_option(&self.options, "packed").map(OptionValue::is_true)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OneofElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub fields: Vec<FieldElement>,
    pub options: Vec<OptionElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumElement {
    pub location: Location,
    pub name: String,
    pub qualified_name: String,
    pub documentation: String,
    pub constants: Vec<EnumConstantElement>,
    pub options: Vec<OptionElement>,
    pub reserveds: Vec<ReservedElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumConstantElement {
    pub location: Location,
    pub name: String,
    pub tag: i32,
    pub documentation: String,
    pub options: Vec<OptionElement>,
}

impl EnumConstantElement {
    pub fn is_deprecated(&self) -> bool {
        option_is_true(&self.options, "deprecated")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub rpcs: Vec<RpcElement>,
    pub options: Vec<OptionElement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RpcElement {
    pub location: Location,
    pub name: String,
    pub documentation: String,
    pub request_type: String,
    pub response_type: String,
    pub request_streaming: bool,
    pub response_streaming: bool,
    pub options: Vec<OptionElement>,
}

/// `extend Target { fields }`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendElement {
    pub location: Location,
    /// Target type as written.
    pub name: String,
    pub documentation: String,
    pub fields: Vec<FieldElement>,
}

/// Inclusive range of tag (or enum) numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagRange {
    pub start: i64,
    pub end: i64,
}

impl TagRange {
    pub fn contains(&self, n: i64) -> bool {
        self.start <= n && n <= self.end
    }
}

impl fmt::Display for TagRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{} to {}", self.start, self.end)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reserved {
    Range(TagRange),
    Name(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReservedElement {
    pub location: Location,
    pub documentation: String,
    pub values: Vec<Reserved>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionsElement {
    pub location: Location,
    pub documentation: String,
    pub ranges: Vec<TagRange>,
}

/// Declared type of a field, before or after linking.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Scalar(ScalarType),
    /// Message or enum name; fully qualified (no leading dot) once linked.
    Named(String),
    Map {
        key: ScalarType,
        value: Box<DataType>,
    },
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Scalar(s) => f.write_str(s.keyword()),
            DataType::Named(n) => f.write_str(n),
            DataType::Map { key, value } => write!(f, "map<{}, {}>", key.keyword(), value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    pub fn from_keyword(s: &str) -> Option<Self> {
        Some(match s {
            "double" => ScalarType::Double,
            "float" => ScalarType::Float,
            "int32" => ScalarType::Int32,
            "int64" => ScalarType::Int64,
            "uint32" => ScalarType::Uint32,
            "uint64" => ScalarType::Uint64,
            "sint32" => ScalarType::Sint32,
            "sint64" => ScalarType::Sint64,
            "fixed32" => ScalarType::Fixed32,
            "fixed64" => ScalarType::Fixed64,
            "sfixed32" => ScalarType::Sfixed32,
            "sfixed64" => ScalarType::Sfixed64,
            "bool" => ScalarType::Bool,
            "string" => ScalarType::String,
            "bytes" => ScalarType::Bytes,
            _ => return None,
        })
    }

    pub fn keyword(self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }

    pub fn wire_type(self) -> WireType {
        match self {
            ScalarType::Int32
            | ScalarType::Int64
            | ScalarType::Uint32
            | ScalarType::Uint64
            | ScalarType::Sint32
            | ScalarType::Sint64
            | ScalarType::Bool => WireType::Varint,
            ScalarType::Fixed64 | ScalarType::Sfixed64 | ScalarType::Double => WireType::Fixed64,
            ScalarType::Fixed32 | ScalarType::Sfixed32 | ScalarType::Float => WireType::Fixed32,
            ScalarType::String | ScalarType::Bytes => WireType::LengthDelimited,
        }
    }

    /// Numeric and bool scalars may use packed encoding when repeated.
    pub fn is_packable(self) -> bool {
        self.wire_type() != WireType::LengthDelimited
    }

    /// Integral, bool and string scalars may key a map.
    pub fn is_valid_map_key(self) -> bool {
        !matches!(self, ScalarType::Double | ScalarType::Float | ScalarType::Bytes)
    }
}

/// One part of an option name; `extension` parts were written in parentheses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionNamePart {
    pub name: String,
    pub extension: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionElement {
    pub location: Location,
    pub name: Vec<OptionNamePart>,
    pub value: OptionValue,
}

impl OptionElement {
    /// Name as written, e.g. `packed` or `(my.opt).field`.
    pub fn display_name(&self) -> String {
        self.name
            .iter()
            .map(|p| {
                if p.extension {
                    format!("({})", p.name)
                } else {
                    p.name.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// True for a single, non-extension name part equal to `name`.
    pub fn is_named(&self, name: &str) -> bool {
        matches!(self.name.as_slice(), [p] if !p.extension && p.name == name)
    }
}

/// Untyped option literal; typing happens during linking.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Bool(bool),
    /// Numeric literal as written, sign included (`-12`, `0x1f`, `1.5`, `inf`).
    Number(String),
    /// String literal contents; may hold any bytes until typed as `string`.
    Str(Vec<u8>),
    /// Bare identifier, usually an enum constant.
    Enum(String),
    /// `{ key: value ... }` message literal.
    Aggregate(Vec<OptionElement>),
    List(Vec<OptionValue>),
}

impl OptionValue {
    /// `true` and `"true"` both count.
    pub fn is_true(&self) -> bool {
        match self {
            OptionValue::Bool(b) => *b,
            OptionValue::Str(s) => s == b"true",
            OptionValue::Enum(s) => s == "true",
            _ => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            OptionValue::Bool(_) => "boolean",
            OptionValue::Number(_) => "number",
            OptionValue::Str(_) => "string",
            OptionValue::Enum(_) => "identifier",
            OptionValue::Aggregate(_) => "message literal",
            OptionValue::List(_) => "list",
        }
    }
}

fn find_option<'a>(options: &'a [OptionElement], name: &str) -> Option<&'a OptionValue> {
    options.iter().rev().find(|o| o.is_named(name)).map(|o| &o.value)
}

fn option_is_true(options: &[OptionElement], name: &str) -> bool {
    find_option(options, name).is_some_and(OptionValue::is_true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_with(options: Vec<OptionElement>) -> FieldElement {
        FieldElement {
            location: Location::default(),
            label: Some(Label::Optional),
            data_type: DataType::Named("CType".to_string()),
            name: "ctype".to_string(),
            tag: 1,
            default: None,
            json_name: None,
            options,
            documentation: String::new(),
        }
    }

    fn option(name: &str, value: OptionValue) -> OptionElement {
        OptionElement {
            location: Location::default(),
            name: vec![OptionNamePart {
                name: name.to_string(),
                extension: false,
            }],
            value,
        }
    }

    #[test]
    fn deprecated_accepts_string_and_boolean() {
        let f1 = field_with(vec![option("deprecated", OptionValue::Str(b"true".to_vec()))]);
        let f2 = field_with(vec![option("deprecated", OptionValue::Bool(true))]);
        assert!(f1.is_deprecated());
        assert!(f2.is_deprecated());
        assert!(!field_with(vec![]).is_deprecated());
    }

    #[test]
    fn packed_accepts_string_and_boolean() {
        let f1 = field_with(vec![option("packed", OptionValue::Str(b"true".to_vec()))]);
        let f2 = field_with(vec![option("packed", OptionValue::Bool(false))]);
        assert_eq!(f1.packed(), Some(true));
        assert_eq!(f2.packed(), Some(false));
        assert_eq!(field_with(vec![]).packed(), None);
    }

    #[test]
    fn extension_option_is_not_a_builtin_flag() {
        let mut opt = option("deprecated", OptionValue::Bool(true));
        opt.name[0].extension = true;
        assert_eq!(opt.display_name(), "(deprecated)");
        assert!(!field_with(vec![opt]).is_deprecated());
    }

    #[test]
    fn scalar_wire_types() {
        assert_eq!(ScalarType::Sint64.wire_type(), WireType::Varint);
        assert_eq!(ScalarType::Double.wire_type(), WireType::Fixed64);
        assert_eq!(ScalarType::Float.wire_type(), WireType::Fixed32);
        assert!(!ScalarType::Bytes.is_packable());
        assert!(!ScalarType::Float.is_valid_map_key());
        assert!(ScalarType::String.is_valid_map_key());
    }
}
