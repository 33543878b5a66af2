//! Merge parsed files into one [`Schema`].
//!
//! Linking runs in phases over the whole file set: declare every type name,
//! build types with their references resolved, attach extensions, then type
//! options and field defaults. Each phase keeps going after an error so that a
//! failed link reports everything it found at once.

use crate::ast::{
    DataType, EnumElement, ExtendElement, FieldElement, Label, Location, MessageElement, OptionElement, OptionValue,
    ProtoFile, Reserved, Syntax, TypeElement,
};
use crate::config::CompileConfig;
use crate::diagnostic::{Diagnostic, DiagnosticKind, LinkError};
use crate::options::{self, OptionContext, OptionFailure, ResolvedOption};
use crate::schema::{
    EnumConstant, EnumType, Field, FieldKind, MessageType, Oneof, Rpc, Schema, SchemaFile, ServiceType, Type,
};
use crate::well_known;
use crate::wire::{MAX_FIELD_NUMBER, RESERVED_FIELD_NUMBERS};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Link `files` (every file reachable from the roots) into a schema.
///
/// Built-in files missing from `files` are added first, so well-known types and
/// the option schema are always available.
pub fn link(files: &[ProtoFile], config: &CompileConfig) -> Result<Schema, LinkError> {
    let builtins = well_known::missing_from(files.iter().map(|f| f.path.as_str()))?;
    let all: Vec<&ProtoFile> = files.iter().chain(builtins.iter()).collect();
    debug!(files = files.len(), builtins = builtins.len(), "linking");

    let mut linker = Linker::new(&all, config);
    linker.declare_all();
    linker.build_types();
    linker.build_extensions();
    linker.resolve_options();
    linker.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclKind {
    Message,
    Enum,
    Service,
}

#[derive(Debug)]
struct Decl {
    file: usize,
    kind: DeclKind,
    location: Location,
}

#[derive(Debug)]
struct ExtensionRef {
    ty: usize,
    index: usize,
    file: usize,
}

/// Where a set of resolved options lands once typed.
#[derive(Debug, Clone, Copy)]
enum OptionTarget {
    File(usize),
    Type(usize),
    Field { ty: usize, index: usize },
    Extension { ty: usize, index: usize },
    Oneof { ty: usize, index: usize },
    EnumValue { ty: usize, index: usize },
    Rpc { ty: usize, index: usize },
}

#[derive(Debug)]
struct PendingOptions {
    file: usize,
    scope: String,
    options_type: &'static str,
    target: OptionTarget,
    elements: Vec<OptionElement>,
}

#[derive(Debug)]
struct PendingDefault {
    file: usize,
    scope: String,
    target: OptionTarget,
    value: OptionValue,
    location: Location,
}

struct Linker<'a> {
    files: &'a [&'a ProtoFile],
    config: &'a CompileConfig,
    /// Per file: the files whose declarations it may reference.
    visible: Vec<HashSet<usize>>,
    decls: HashMap<String, Decl>,
    types: Vec<Type>,
    type_index: HashMap<String, usize>,
    extends: Vec<(usize, String, &'a ExtendElement)>,
    extension_index: HashMap<String, ExtensionRef>,
    file_options: Vec<Vec<ResolvedOption>>,
    pending_options: Vec<PendingOptions>,
    pending_defaults: Vec<PendingDefault>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Linker<'a> {
    fn new(files: &'a [&'a ProtoFile], config: &'a CompileConfig) -> Self {
        let by_path: HashMap<&str, usize> = files.iter().enumerate().map(|(i, f)| (f.path.as_str(), i)).collect();
        let builtins: Vec<usize> = files
            .iter()
            .enumerate()
            .filter(|(_, f)| well_known::is_builtin(&f.path))
            .map(|(i, _)| i)
            .collect();
        let mut diagnostics = Vec::new();
        let mut visible = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            let mut set: HashSet<usize> = builtins.iter().copied().collect();
            set.insert(i);
            for import in file.all_imports() {
                match by_path.get(import) {
                    Some(&j) => add_public_closure(files, &by_path, j, &mut set),
                    None => diagnostics.push(Diagnostic::new(
                        DiagnosticKind::Linkage,
                        file.import_location(import),
                        format!("import \"{}\" not found", import),
                    )),
                }
            }
            visible.push(set);
        }
        Linker {
            files,
            config,
            visible,
            decls: HashMap::new(),
            types: Vec::new(),
            type_index: HashMap::new(),
            extends: Vec::new(),
            extension_index: HashMap::new(),
            file_options: vec![Vec::new(); files.len()],
            pending_options: Vec::new(),
            pending_defaults: Vec::new(),
            diagnostics,
        }
    }

    fn error(&mut self, kind: DiagnosticKind, location: Location, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(kind, location, message));
    }

    // ==================== Declarations ====================

    fn declare_all(&mut self) {
        let files = self.files;
        for (fi, file) in files.iter().enumerate() {
            let package = file.package.as_deref().unwrap_or("");
            for t in &file.types {
                self.declare_type(fi, package, t);
            }
            for s in &file.services {
                self.declare(fi, qualify(package, &s.name), DeclKind::Service, &s.location);
            }
        }
        debug!(declarations = self.decls.len(), "names declared");
    }

    fn declare_type(&mut self, fi: usize, package: &str, t: &TypeElement) {
        match t {
            TypeElement::Message(m) => {
                let name = qualify(package, &m.qualified_name);
                self.declare(fi, name.clone(), DeclKind::Message, &m.location);
                for f in &m.fields {
                    if let DataType::Map { .. } = f.data_type {
                        let entry = format!("{}.{}", name, map_entry_name(&f.name));
                        self.declare(fi, entry, DeclKind::Message, &f.location);
                    }
                }
                for nested in &m.nested {
                    self.declare_type(fi, package, nested);
                }
            }
            TypeElement::Enum(e) => {
                self.declare(fi, qualify(package, &e.qualified_name), DeclKind::Enum, &e.location);
            }
        }
    }

    fn declare(&mut self, file: usize, name: String, kind: DeclKind, location: &Location) {
        if let Some(previous) = self.decls.get(&name) {
            let message = format!("{} is already defined at {}", name, previous.location);
            self.error(DiagnosticKind::Schema, location.clone(), message);
            return;
        }
        self.decls.insert(
            name,
            Decl {
                file,
                kind,
                location: location.clone(),
            },
        );
    }

    // ==================== Resolution ====================

    /// Resolve `name` as written in `scope` of `file`: innermost scope first,
    /// then each enclosing scope out to the root, keeping only declarations the
    /// file can see. A leading dot skips the climb.
    fn resolve(&self, file: usize, scope: &str, name: &str) -> Result<(String, DeclKind, usize), String> {
        let mut hidden: Option<(String, usize)> = None;
        let mut try_candidate = |candidate: String| -> Option<(String, DeclKind, usize)> {
            let decl = self.decls.get(&candidate)?;
            if self.visible[file].contains(&decl.file) {
                return Some((candidate, decl.kind, decl.file));
            }
            hidden.get_or_insert((candidate, decl.file));
            None
        };
        if let Some(absolute) = name.strip_prefix('.') {
            if let Some(found) = try_candidate(absolute.to_string()) {
                return Ok(found);
            }
        } else {
            let mut scope = scope.to_string();
            loop {
                if let Some(found) = try_candidate(qualify(&scope, name)) {
                    return Ok(found);
                }
                if scope.is_empty() {
                    break;
                }
                match scope.rfind('.') {
                    Some(i) => scope.truncate(i),
                    None => scope.clear(),
                }
            }
        }
        Err(match hidden {
            Some((candidate, decl_file)) => format!(
                "unable to resolve {}: {} is declared in {}, which is not imported",
                name, candidate, self.files[decl_file].path
            ),
            None => format!("unable to resolve {}", name),
        })
    }

    /// Same climb over extension names, for option names in parentheses.
    fn resolve_extension(&self, file: usize, scope: &str, name: &str) -> Option<&Field> {
        let found = |candidate: &str| {
            self.extension_index
                .get(candidate)
                .filter(|r| self.visible[file].contains(&r.file))
                .and_then(|r| self.types.get(r.ty)?.as_message()?.extensions.get(r.index))
        };
        if let Some(absolute) = name.strip_prefix('.') {
            return found(absolute);
        }
        let mut scope = scope.to_string();
        loop {
            if let Some(f) = found(&qualify(&scope, name)) {
                return Some(f);
            }
            if scope.is_empty() {
                return None;
            }
            match scope.rfind('.') {
                Some(i) => scope.truncate(i),
                None => scope.clear(),
            }
        }
    }

    fn resolve_named(&mut self, fi: usize, scope: &str, name: &str, location: &Location) -> (String, FieldKind) {
        match self.resolve(fi, scope, name) {
            Ok((full, DeclKind::Message, _)) => (full.clone(), FieldKind::Message(full)),
            Ok((full, DeclKind::Enum, decl_file)) => {
                let closed = self.files[decl_file].syntax == Syntax::Proto2;
                (full.clone(), FieldKind::Enum { type_name: full, closed })
            }
            Ok((full, DeclKind::Service, _)) => {
                self.error(
                    DiagnosticKind::Schema,
                    location.clone(),
                    format!("{} is a service, not a message or enum type", full),
                );
                (full.clone(), FieldKind::Message(full))
            }
            Err(message) => {
                self.error(DiagnosticKind::Linkage, location.clone(), message);
                (name.to_string(), FieldKind::Message(name.to_string()))
            }
        }
    }

    fn resolve_data_type(&mut self, fi: usize, scope: &str, owner: &str, f: &FieldElement) -> (DataType, FieldKind) {
        match &f.data_type {
            DataType::Scalar(s) => (DataType::Scalar(*s), FieldKind::Scalar(*s)),
            DataType::Named(n) => {
                let (full, kind) = self.resolve_named(fi, scope, n, &f.location);
                (DataType::Named(full), kind)
            }
            DataType::Map { key, value } => {
                if !key.is_valid_map_key() {
                    self.error(
                        DiagnosticKind::Schema,
                        f.location.clone(),
                        format!("map key of '{}' must be an integral, bool or string type, not {}", f.name, key.keyword()),
                    );
                }
                let (value_type, value_kind) = match value.as_ref() {
                    DataType::Scalar(s) => (DataType::Scalar(*s), FieldKind::Scalar(*s)),
                    DataType::Named(n) => {
                        let (full, kind) = self.resolve_named(fi, scope, n, &f.location);
                        (DataType::Named(full), kind)
                    }
                    DataType::Map { .. } => {
                        self.error(DiagnosticKind::Schema, f.location.clone(), "map values cannot themselves be maps");
                        (value.as_ref().clone(), FieldKind::Scalar(crate::ast::ScalarType::Bytes))
                    }
                };
                let entry = format!("{}.{}", owner, map_entry_name(&f.name));
                (
                    DataType::Map {
                        key: *key,
                        value: Box::new(value_type),
                    },
                    FieldKind::Map {
                        entry,
                        key: *key,
                        value: Box::new(value_kind),
                    },
                )
            }
        }
    }

    // ==================== Types ====================

    fn build_types(&mut self) {
        let files = self.files;
        for (fi, file) in files.iter().enumerate() {
            let package = file.package.as_deref().unwrap_or("");
            for t in &file.types {
                self.build_type(fi, package, None, t);
            }
            for ext in &file.extends {
                self.extends.push((fi, package.to_string(), ext));
            }
            for s in &file.services {
                self.build_service(fi, package, s);
            }
            if !file.options.is_empty() {
                self.pending_options.push(PendingOptions {
                    file: fi,
                    scope: package.to_string(),
                    options_type: options::FILE_OPTIONS,
                    target: OptionTarget::File(fi),
                    elements: file.options.clone(),
                });
            }
        }
        debug!(types = self.types.len(), "types built");
    }

    fn build_type(&mut self, fi: usize, package: &str, enclosing: Option<&str>, t: &'a TypeElement) {
        match t {
            TypeElement::Message(m) => self.build_message(fi, package, enclosing, m),
            TypeElement::Enum(e) => self.build_enum(fi, package, enclosing, e),
        }
    }

    fn push_type(&mut self, t: Type) -> usize {
        let index = self.types.len();
        self.type_index.entry(t.name().to_string()).or_insert(index);
        self.types.push(t);
        index
    }

    fn build_message(&mut self, fi: usize, package: &str, enclosing: Option<&str>, m: &'a MessageElement) {
        let file = self.files[fi];
        let name = qualify(package, &m.qualified_name);
        let index = self.types.len();

        // Oneof members and plain fields are kept apart by the parser; source
        // position restores declaration order.
        let mut declared: Vec<(&FieldElement, Option<usize>)> = m.fields.iter().map(|f| (f, None)).collect();
        for (i, o) in m.oneofs.iter().enumerate() {
            declared.extend(o.fields.iter().map(|f| (f, Some(i))));
        }
        declared.sort_by_key(|(f, _)| (f.location.line, f.location.column));

        let mut fields = Vec::with_capacity(declared.len());
        let mut entries = Vec::new();
        for (f, oneof) in declared {
            let target = OptionTarget::Field {
                ty: index,
                index: fields.len(),
            };
            let field = self.build_field(fi, &name, &name, f, oneof, target);
            if let Some(entry) = self.map_entry(fi, &name, &field) {
                entries.push(entry);
            }
            fields.push(field);
        }

        let mut oneofs = Vec::with_capacity(m.oneofs.len());
        for (i, o) in m.oneofs.iter().enumerate() {
            if o.fields.is_empty() {
                self.error(
                    DiagnosticKind::Schema,
                    o.location.clone(),
                    format!("oneof {}.{} must have at least one field", name, o.name),
                );
            }
            if !o.options.is_empty() {
                self.pending_options.push(PendingOptions {
                    file: fi,
                    scope: name.clone(),
                    options_type: options::ONEOF_OPTIONS,
                    target: OptionTarget::Oneof { ty: index, index: i },
                    elements: o.options.clone(),
                });
            }
            oneofs.push(Oneof {
                name: o.name.clone(),
                location: o.location.clone(),
                documentation: o.documentation.clone(),
                fields: o.fields.iter().map(|f| f.tag).collect(),
                options: Vec::new(),
            });
        }

        let reserved: Vec<Reserved> = m.reserveds.iter().flat_map(|r| r.values.iter().cloned()).collect();
        let extension_ranges: Vec<_> = m.extensions.iter().flat_map(|e| e.ranges.iter().copied()).collect();
        self.check_fields(&name, &fields, &reserved, &extension_ranges);

        if !m.options.is_empty() {
            self.pending_options.push(PendingOptions {
                file: fi,
                scope: name.clone(),
                options_type: options::MESSAGE_OPTIONS,
                target: OptionTarget::Type(index),
                elements: m.options.clone(),
            });
        }
        for ext in &m.extends {
            self.extends.push((fi, name.clone(), ext));
        }

        let pushed = self.push_type(Type::Message(MessageType {
            name: name.clone(),
            enclosing: enclosing.map(str::to_string),
            file: file.path.clone(),
            syntax: file.syntax,
            location: m.location.clone(),
            documentation: m.documentation.clone(),
            fields,
            oneofs,
            extensions: Vec::new(),
            extension_ranges,
            reserved,
            options: Vec::new(),
            map_entry: false,
        }));
        debug_assert_eq!(pushed, index);

        for nested in &m.nested {
            self.build_type(fi, package, Some(&name), nested);
        }
        for entry in entries {
            self.push_type(Type::Message(entry));
        }
    }

    fn build_field(
        &mut self,
        fi: usize,
        scope: &str,
        owner: &str,
        f: &FieldElement,
        oneof: Option<usize>,
        target: OptionTarget,
    ) -> Field {
        let syntax = self.files[fi].syntax;
        let label = match f.label {
            Some(label) => label,
            None if matches!(f.data_type, DataType::Map { .. }) => Label::Repeated,
            None => Label::Optional,
        };
        if syntax == Syntax::Proto3 && label == Label::Required {
            self.error(
                DiagnosticKind::Schema,
                f.location.clone(),
                format!("required field '{}' is not allowed in proto3", f.name),
            );
        }
        let (data_type, kind) = self.resolve_data_type(fi, scope, owner, f);
        let repeated = label == Label::Repeated;
        let packable = repeated && kind.is_packable();
        let packed = match f.packed() {
            Some(true) if !packable => {
                self.error(
                    DiagnosticKind::Schema,
                    f.location.clone(),
                    format!("[packed = true] on '{}': only repeated numeric, bool or enum fields can be packed", f.name),
                );
                false
            }
            Some(explicit) => explicit,
            None => syntax == Syntax::Proto3 && packable,
        };
        if let Some(default) = &f.default {
            if syntax == Syntax::Proto3 {
                self.error(
                    DiagnosticKind::Schema,
                    f.location.clone(),
                    format!("explicit default on '{}' is not allowed in proto3", f.name),
                );
            } else if repeated || matches!(kind, FieldKind::Message(_) | FieldKind::Map { .. }) {
                self.error(
                    DiagnosticKind::Schema,
                    f.location.clone(),
                    format!("default values are not allowed on repeated or message field '{}'", f.name),
                );
            } else {
                self.pending_defaults.push(PendingDefault {
                    file: fi,
                    scope: scope.to_string(),
                    target,
                    value: default.clone(),
                    location: f.location.clone(),
                });
            }
        }
        if !f.options.is_empty() {
            self.pending_options.push(PendingOptions {
                file: fi,
                scope: scope.to_string(),
                options_type: options::FIELD_OPTIONS,
                target,
                elements: f.options.clone(),
            });
        }
        Field {
            name: f.name.clone(),
            full_name: qualify(owner, &f.name),
            tag: f.tag,
            label,
            data_type,
            kind,
            packed,
            oneof,
            default: None,
            json_name: f.json_name.clone().unwrap_or_else(|| json_name(&f.name)),
            deprecated: f.is_deprecated(),
            redacted: false,
            extendee: None,
            options: Vec::new(),
            location: f.location.clone(),
            documentation: f.documentation.clone(),
        }
    }

    /// Synthetic `key = 1, value = 2` message backing a map field.
    fn map_entry(&self, fi: usize, owner: &str, field: &Field) -> Option<MessageType> {
        let (FieldKind::Map { entry, key, value }, DataType::Map { value: value_type, .. }) = (&field.kind, &field.data_type)
        else {
            return None;
        };
        let file = self.files[fi];
        let member = |name: &str, tag: u32, data_type: DataType, kind: FieldKind| Field {
            name: name.to_string(),
            full_name: format!("{}.{}", entry, name),
            tag,
            label: Label::Optional,
            data_type,
            kind,
            packed: false,
            oneof: None,
            default: None,
            json_name: name.to_string(),
            deprecated: false,
            redacted: false,
            extendee: None,
            options: Vec::new(),
            location: field.location.clone(),
            documentation: String::new(),
        };
        Some(MessageType {
            name: entry.clone(),
            enclosing: Some(owner.to_string()),
            file: file.path.clone(),
            syntax: file.syntax,
            location: field.location.clone(),
            documentation: String::new(),
            fields: vec![
                member("key", 1, DataType::Scalar(*key), FieldKind::Scalar(*key)),
                member("value", 2, value_type.as_ref().clone(), value.as_ref().clone()),
            ],
            oneofs: Vec::new(),
            extensions: Vec::new(),
            extension_ranges: Vec::new(),
            reserved: Vec::new(),
            options: Vec::new(),
            map_entry: true,
        })
    }

    fn check_tag(&mut self, field: &Field) {
        if field.tag < 1 || field.tag > MAX_FIELD_NUMBER {
            self.error(
                DiagnosticKind::Schema,
                field.location.clone(),
                format!(
                    "field number {} of '{}' is out of range (1 to {})",
                    field.tag, field.name, MAX_FIELD_NUMBER
                ),
            );
        } else if RESERVED_FIELD_NUMBERS.contains(&field.tag) {
            self.error(
                DiagnosticKind::Schema,
                field.location.clone(),
                format!(
                    "field number {} of '{}' is in 19000 to 19999, which is reserved for the protocol buffer implementation",
                    field.tag, field.name
                ),
            );
        }
    }

    fn check_fields(&mut self, message: &str, fields: &[Field], reserved: &[Reserved], extension_ranges: &[crate::ast::TagRange]) {
        let mut by_tag: HashMap<u32, &Field> = HashMap::new();
        let mut by_name: HashMap<&str, &Field> = HashMap::new();
        for f in fields {
            self.check_tag(f);
            match by_tag.get(&f.tag) {
                Some(previous) => self.error(
                    DiagnosticKind::Schema,
                    f.location.clone(),
                    format!(
                        "field number {} in {} is used by both '{}' ({}) and '{}' ({})",
                        f.tag, message, previous.name, previous.location, f.name, f.location
                    ),
                ),
                None => {
                    by_tag.insert(f.tag, f);
                }
            }
            match by_name.get(f.name.as_str()) {
                Some(previous) => self.error(
                    DiagnosticKind::Schema,
                    f.location.clone(),
                    format!("field name '{}' in {} is already used at {}", f.name, message, previous.location),
                ),
                None => {
                    by_name.insert(&f.name, f);
                }
            }
            for r in reserved {
                match r {
                    Reserved::Range(range) if range.contains(f.tag as i64) => self.error(
                        DiagnosticKind::Schema,
                        f.location.clone(),
                        format!("field '{}' uses reserved field number {} in {}", f.name, f.tag, message),
                    ),
                    Reserved::Name(n) if *n == f.name => self.error(
                        DiagnosticKind::Schema,
                        f.location.clone(),
                        format!("field name '{}' is reserved in {}", f.name, message),
                    ),
                    _ => {}
                }
            }
            if let Some(range) = extension_ranges.iter().find(|r| r.contains(f.tag as i64)) {
                self.error(
                    DiagnosticKind::Schema,
                    f.location.clone(),
                    format!("field number {} of '{}' overlaps extension range {}", f.tag, f.name, range),
                );
            }
        }
    }

    fn build_enum(&mut self, fi: usize, package: &str, enclosing: Option<&str>, e: &EnumElement) {
        let file = self.files[fi];
        let name = qualify(package, &e.qualified_name);
        let index = self.types.len();
        let allow_alias = e.options.iter().any(|o| o.is_named("allow_alias") && o.value.is_true());
        let reserved: Vec<Reserved> = e.reserveds.iter().flat_map(|r| r.values.iter().cloned()).collect();

        match e.constants.first() {
            None => self.error(
                DiagnosticKind::Schema,
                e.location.clone(),
                format!("enum {} must declare at least one value", name),
            ),
            Some(first) if file.syntax == Syntax::Proto3 && first.tag != 0 => self.error(
                DiagnosticKind::Schema,
                first.location.clone(),
                format!("the first value of proto3 enum {} must be zero", name),
            ),
            Some(_) => {}
        }

        let mut constants = Vec::with_capacity(e.constants.len());
        let mut by_number: HashMap<i32, usize> = HashMap::new();
        let mut by_name: HashMap<&str, usize> = HashMap::new();
        for (i, c) in e.constants.iter().enumerate() {
            if let Some(&prev) = by_number.get(&c.tag) {
                if !allow_alias {
                    let previous = &e.constants[prev];
                    self.error(
                        DiagnosticKind::Schema,
                        c.location.clone(),
                        format!(
                            "enum value {} in {} is used by both {} ({}) and {}; set option allow_alias = true to permit aliases",
                            c.tag, name, previous.name, previous.location, c.name
                        ),
                    );
                }
            } else {
                by_number.insert(c.tag, i);
            }
            if let Some(&prev) = by_name.get(c.name.as_str()) {
                let message = format!("enum value name {} in {} is already used at {}", c.name, name, e.constants[prev].location);
                self.error(DiagnosticKind::Schema, c.location.clone(), message);
            } else {
                by_name.insert(&c.name, i);
            }
            for r in &reserved {
                match r {
                    Reserved::Range(range) if range.contains(c.tag as i64) => self.error(
                        DiagnosticKind::Schema,
                        c.location.clone(),
                        format!("enum value {} uses reserved number {} in {}", c.name, c.tag, name),
                    ),
                    Reserved::Name(n) if *n == c.name => self.error(
                        DiagnosticKind::Schema,
                        c.location.clone(),
                        format!("enum value name {} is reserved in {}", c.name, name),
                    ),
                    _ => {}
                }
            }
            if !c.options.is_empty() {
                self.pending_options.push(PendingOptions {
                    file: fi,
                    scope: name.clone(),
                    options_type: options::ENUM_VALUE_OPTIONS,
                    target: OptionTarget::EnumValue { ty: index, index: i },
                    elements: c.options.clone(),
                });
            }
            constants.push(EnumConstant {
                name: c.name.clone(),
                number: c.tag,
                location: c.location.clone(),
                documentation: c.documentation.clone(),
                deprecated: c.is_deprecated(),
                options: Vec::new(),
            });
        }
        if !e.options.is_empty() {
            self.pending_options.push(PendingOptions {
                file: fi,
                scope: name.clone(),
                options_type: options::ENUM_OPTIONS,
                target: OptionTarget::Type(index),
                elements: e.options.clone(),
            });
        }
        self.push_type(Type::Enum(EnumType {
            name,
            enclosing: enclosing.map(str::to_string),
            file: file.path.clone(),
            syntax: file.syntax,
            location: e.location.clone(),
            documentation: e.documentation.clone(),
            constants,
            reserved,
            allow_alias,
            options: Vec::new(),
        }));
    }

    fn build_service(&mut self, fi: usize, package: &str, s: &crate::ast::ServiceElement) {
        let file = self.files[fi];
        let name = qualify(package, &s.name);
        let index = self.types.len();
        let mut rpcs = Vec::with_capacity(s.rpcs.len());
        let mut seen: HashMap<&str, &Location> = HashMap::new();
        for (i, r) in s.rpcs.iter().enumerate() {
            if let Some(previous) = seen.insert(&r.name, &r.location) {
                let message = format!("rpc {} in {} is already defined at {}", r.name, name, previous);
                self.error(DiagnosticKind::Schema, r.location.clone(), message);
            }
            let request_type = self.resolve_rpc_type(fi, package, &r.request_type, "request", &r.name, &r.location);
            let response_type = self.resolve_rpc_type(fi, package, &r.response_type, "response", &r.name, &r.location);
            if !r.options.is_empty() {
                self.pending_options.push(PendingOptions {
                    file: fi,
                    scope: name.clone(),
                    options_type: options::METHOD_OPTIONS,
                    target: OptionTarget::Rpc { ty: index, index: i },
                    elements: r.options.clone(),
                });
            }
            rpcs.push(Rpc {
                name: r.name.clone(),
                request_type,
                response_type,
                request_streaming: r.request_streaming,
                response_streaming: r.response_streaming,
                location: r.location.clone(),
                documentation: r.documentation.clone(),
                options: Vec::new(),
            });
        }
        if !s.options.is_empty() {
            self.pending_options.push(PendingOptions {
                file: fi,
                scope: name.clone(),
                options_type: options::SERVICE_OPTIONS,
                target: OptionTarget::Type(index),
                elements: s.options.clone(),
            });
        }
        self.push_type(Type::Service(ServiceType {
            name,
            file: file.path.clone(),
            location: s.location.clone(),
            documentation: s.documentation.clone(),
            rpcs,
            options: Vec::new(),
        }));
    }

    fn resolve_rpc_type(&mut self, fi: usize, package: &str, name: &str, role: &str, rpc: &str, location: &Location) -> String {
        match self.resolve(fi, package, name) {
            Ok((full, DeclKind::Message, _)) => full,
            Ok((full, _, _)) => {
                self.error(
                    DiagnosticKind::Schema,
                    location.clone(),
                    format!("{} type of rpc {} must be a message, but {} is not", role, rpc, full),
                );
                full
            }
            Err(message) => {
                self.error(DiagnosticKind::Linkage, location.clone(), message);
                name.to_string()
            }
        }
    }

    // ==================== Extensions ====================

    fn build_extensions(&mut self) {
        let extends = std::mem::take(&mut self.extends);
        for (fi, scope, ext) in extends {
            let target = match self.resolve(fi, &scope, &ext.name) {
                Ok((full, DeclKind::Message, _)) => full,
                Ok((full, _, _)) => {
                    self.error(
                        DiagnosticKind::Schema,
                        ext.location.clone(),
                        format!("{} is not a message type and cannot be extended", full),
                    );
                    continue;
                }
                Err(message) => {
                    self.error(DiagnosticKind::Linkage, ext.location.clone(), message);
                    continue;
                }
            };
            let Some(&ty) = self.type_index.get(&target) else {
                continue;
            };
            for f in &ext.fields {
                let index = self.types[ty].as_message().map_or(0, |m| m.extensions.len());
                let mut field = self.build_field(fi, &scope, &scope, f, None, OptionTarget::Extension { ty, index });
                field.extendee = Some(target.clone());
                self.check_extension(&target, ty, fi, &field);
                if let Some(Type::Message(m)) = self.types.get_mut(ty) {
                    m.extensions.push(field);
                }
            }
        }
        debug!(extensions = self.extension_index.len(), "extensions attached");
    }

    fn check_extension(&mut self, target: &str, ty: usize, fi: usize, field: &Field) {
        self.check_tag(field);
        if field.label == Label::Required {
            self.error(
                DiagnosticKind::Schema,
                field.location.clone(),
                format!("extension {} cannot be required", field.full_name),
            );
        }
        let conflict = self.types[ty].as_message().and_then(|m| {
            if !m.in_extension_range(field.tag) {
                Some(format!(
                    "extension {} uses field number {}, which is not in an extension range of {}",
                    field.full_name, field.tag, target
                ))
            } else {
                m.field(field.tag).map(|existing| {
                    format!(
                        "extension {} uses field number {} of {}, already used by {} ({})",
                        field.full_name, field.tag, target, existing.full_name, existing.location
                    )
                })
            }
        });
        if let Some(message) = conflict {
            self.error(DiagnosticKind::Schema, field.location.clone(), message);
        }
        if let Some(previous) = self.extension_index.get(&field.full_name) {
            let at = self.types[previous.ty]
                .as_message()
                .and_then(|m| m.extensions.get(previous.index))
                .map(|f| f.location.to_string())
                .unwrap_or_default();
            let message = format!("extension {} is already defined at {}", field.full_name, at);
            self.error(DiagnosticKind::Schema, field.location.clone(), message);
            return;
        }
        let index = self.types[ty].as_message().map_or(0, |m| m.extensions.len());
        self.extension_index.insert(field.full_name.clone(), ExtensionRef { ty, index, file: fi });
    }

    // ==================== Options ====================

    fn resolve_options(&mut self) {
        let pending = std::mem::take(&mut self.pending_options);
        let defaults = std::mem::take(&mut self.pending_defaults);
        let mut diagnostics = Vec::new();
        let mut resolved = Vec::with_capacity(pending.len());
        let mut typed_defaults = Vec::with_capacity(defaults.len());

        for p in &pending {
            let ctx = Lookup {
                linker: self,
                file: p.file,
                scope: &p.scope,
            };
            let mut out = Vec::with_capacity(p.elements.len());
            for element in &p.elements {
                match options::resolve(&ctx, p.options_type, element) {
                    Ok(option) => out.push(option),
                    Err(OptionFailure::Unknown(message)) if self.config.allow_unknown_options => {
                        warn!(location = %element.location, "ignoring option: {}", message);
                    }
                    Err(OptionFailure::Unknown(message)) | Err(OptionFailure::Invalid(message)) => {
                        diagnostics.push(Diagnostic::new(DiagnosticKind::Option, element.location.clone(), message));
                    }
                }
            }
            resolved.push((p.target, out));
        }
        for d in &defaults {
            let Some(field) = self.field_at(d.target) else {
                continue;
            };
            let ctx = Lookup {
                linker: self,
                file: d.file,
                scope: &d.scope,
            };
            match options::typed_element(&ctx, &field.kind, &d.value) {
                Ok(value) => typed_defaults.push((d.target, value)),
                Err(message) => diagnostics.push(Diagnostic::new(
                    DiagnosticKind::Option,
                    d.location.clone(),
                    format!("default value of '{}': {}", field.name, message),
                )),
            }
        }

        self.diagnostics.extend(diagnostics);
        debug!(sets = resolved.len(), defaults = typed_defaults.len(), "options resolved");
        for (target, options) in resolved {
            self.apply_options(target, options);
        }
        for (target, value) in typed_defaults {
            if let Some(f) = self.field_at_mut(target) {
                f.default = Some(value);
            }
        }
    }

    fn field_at(&self, target: OptionTarget) -> Option<&Field> {
        match target {
            OptionTarget::Field { ty, index } => self.types.get(ty)?.as_message()?.fields.get(index),
            OptionTarget::Extension { ty, index } => self.types.get(ty)?.as_message()?.extensions.get(index),
            _ => None,
        }
    }

    fn field_at_mut(&mut self, target: OptionTarget) -> Option<&mut Field> {
        let (ty, index, extension) = match target {
            OptionTarget::Field { ty, index } => (ty, index, false),
            OptionTarget::Extension { ty, index } => (ty, index, true),
            _ => return None,
        };
        match self.types.get_mut(ty)? {
            Type::Message(m) => {
                if extension {
                    m.extensions.get_mut(index)
                } else {
                    m.fields.get_mut(index)
                }
            }
            _ => None,
        }
    }

    fn apply_options(&mut self, target: OptionTarget, options: Vec<ResolvedOption>) {
        match target {
            OptionTarget::File(fi) => {
                if let Some(slot) = self.file_options.get_mut(fi) {
                    *slot = options;
                }
            }
            OptionTarget::Type(ty) => {
                if let Some(t) = self.types.get_mut(ty) {
                    *t.options_mut() = options;
                }
            }
            OptionTarget::Field { .. } | OptionTarget::Extension { .. } => {
                if let Some(f) = self.field_at_mut(target) {
                    f.redacted = options.iter().any(ResolvedOption::is_redaction);
                    f.options = options;
                }
            }
            OptionTarget::Oneof { ty, index } => {
                if let Some(Type::Message(m)) = self.types.get_mut(ty) {
                    if let Some(o) = m.oneofs.get_mut(index) {
                        o.options = options;
                    }
                }
            }
            OptionTarget::EnumValue { ty, index } => {
                if let Some(Type::Enum(e)) = self.types.get_mut(ty) {
                    if let Some(c) = e.constants.get_mut(index) {
                        c.options = options;
                    }
                }
            }
            OptionTarget::Rpc { ty, index } => {
                if let Some(Type::Service(s)) = self.types.get_mut(ty) {
                    if let Some(r) = s.rpcs.get_mut(index) {
                        r.options = options;
                    }
                }
            }
        }
    }

    fn finish(mut self) -> Result<Schema, LinkError> {
        if !self.diagnostics.is_empty() {
            debug!(errors = self.diagnostics.len(), "link failed");
            return Err(LinkError {
                diagnostics: self.diagnostics,
            });
        }
        let files = self
            .files
            .iter()
            .enumerate()
            .map(|(i, f)| SchemaFile {
                path: f.path.clone(),
                package: f.package.clone(),
                syntax: f.syntax,
                imports: f.imports.clone(),
                public_imports: f.public_imports.clone(),
                options: std::mem::take(&mut self.file_options[i]),
                types: self
                    .types
                    .iter()
                    .filter(|t| t.file() == f.path)
                    .map(|t| t.name().to_string())
                    .collect(),
            })
            .collect();
        Ok(Schema::new(files, self.types))
    }
}

struct Lookup<'l, 'a> {
    linker: &'l Linker<'a>,
    file: usize,
    scope: &'l str,
}

impl OptionContext for Lookup<'_, '_> {
    fn message(&self, name: &str) -> Option<&MessageType> {
        let i = *self.linker.type_index.get(name.trim_start_matches('.'))?;
        self.linker.types.get(i)?.as_message()
    }

    fn enum_type(&self, name: &str) -> Option<&EnumType> {
        let i = *self.linker.type_index.get(name.trim_start_matches('.'))?;
        self.linker.types.get(i)?.as_enum()
    }

    fn extension(&self, name: &str) -> Option<&Field> {
        self.linker.resolve_extension(self.file, self.scope, name)
    }
}

fn add_public_closure(files: &[&ProtoFile], by_path: &HashMap<&str, usize>, start: usize, set: &mut HashSet<usize>) {
    let mut stack = vec![start];
    let mut walked = HashSet::new();
    while let Some(i) = stack.pop() {
        if !walked.insert(i) {
            continue;
        }
        set.insert(i);
        for public in &files[i].public_imports {
            if let Some(&j) = by_path.get(public.as_str()) {
                stack.push(j);
            }
        }
    }
}

fn qualify(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}

/// `foo_bar` -> `fooBar`.
fn json_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// `foo_bar` -> `FooBarEntry`.
fn map_entry_name(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 5);
    let mut upper = true;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out.push_str("Entry");
    out
}
