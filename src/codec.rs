//! Encode/decode message values against linked message types.
//!
//! Every field is framed as a tag followed by a payload. The encoder writes
//! present fields in declaration order, then any captured unknown bytes; the
//! decoder accepts fields in any order, packed or unpacked, and keeps whatever
//! the schema does not know verbatim.

use crate::adapter::{AdapterId, Registry};
use crate::ast::{Label, ScalarType};
use crate::schema::{FieldKind, MessageType};
use crate::value::{MessageValue, Value};
use crate::wire::{self, ProtoReader, ProtoWriter, WireType};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt data: {0}")]
    CorruptData(String),
    #[error("Missing required field: {0}")]
    MissingRequired(String),
    #[error("Oneof conflict: {0}")]
    OneofConflict(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Unknown type: {0}")]
    UnknownType(String),
    #[error("Recursion limit exceeded: nesting deeper than {0}")]
    RecursionLimit(usize),
}

/// Payload codec of one field element, with message types bound to registry slots.
#[derive(Debug, Clone)]
pub enum FieldCodec {
    Scalar(ScalarType),
    /// `closed` holds the declared numbers of a closed enum.
    Enum { closed: Option<Arc<[i32]>> },
    Message(AdapterId),
    Map { key: ScalarType, value: Box<FieldCodec> },
}

impl FieldCodec {
    pub fn wire_type(&self) -> WireType {
        match self {
            FieldCodec::Scalar(s) => s.wire_type(),
            FieldCodec::Enum { .. } => WireType::Varint,
            FieldCodec::Message(_) | FieldCodec::Map { .. } => WireType::LengthDelimited,
        }
    }

    fn is_packable(&self) -> bool {
        match self {
            FieldCodec::Scalar(s) => s.is_packable(),
            FieldCodec::Enum { .. } => true,
            _ => false,
        }
    }

    /// False for a number a closed enum does not declare.
    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldCodec::Enum { closed: Some(known) }, Value::Enum(n)) => known.contains(n),
            _ => true,
        }
    }

    fn default_value(&self) -> Value {
        match self {
            FieldCodec::Scalar(s) => scalar_default(*s),
            FieldCodec::Enum { .. } => Value::Enum(0),
            FieldCodec::Message(_) => Value::Message(MessageValue::default()),
            FieldCodec::Map { .. } => Value::Map(Vec::new()),
        }
    }
}

/// One field of a message adapter.
#[derive(Debug, Clone)]
pub struct FieldBinding {
    pub name: String,
    pub tag: u32,
    pub label: Label,
    pub packed: bool,
    pub oneof: Option<usize>,
    pub redacted: bool,
    pub codec: FieldCodec,
}

/// Encode/decode plan for one message type.
#[derive(Debug)]
pub struct MessageAdapter {
    pub name: String,
    /// Declared fields in declaration order, then extensions.
    pub fields: Vec<FieldBinding>,
    pub oneofs: Vec<String>,
    by_tag: HashMap<u32, usize>,
}

impl MessageAdapter {
    pub(crate) fn new(
        message: &MessageType,
        mut bind: impl FnMut(&FieldKind) -> Result<FieldCodec, String>,
    ) -> Result<Self, String> {
        let mut fields = Vec::new();
        for f in message.all_fields() {
            fields.push(FieldBinding {
                name: f.name.clone(),
                tag: f.tag,
                label: f.label,
                packed: f.packed,
                oneof: f.oneof,
                redacted: f.redacted,
                codec: bind(&f.kind)?,
            });
        }
        let by_tag = fields.iter().enumerate().map(|(i, b)| (b.tag, i)).collect();
        Ok(MessageAdapter {
            name: message.name.clone(),
            fields,
            oneofs: message.oneofs.iter().map(|o| o.name.clone()).collect(),
            by_tag,
        })
    }

    pub fn binding(&self, tag: u32) -> Option<&FieldBinding> {
        self.by_tag.get(&tag).map(|&i| &self.fields[i])
    }

    pub fn binding_named(&self, name: &str) -> Option<&FieldBinding> {
        self.fields.iter().find(|b| b.name == name)
    }
}

/// Message-level engine; message references are looked up in the registry per call.
pub(crate) struct Codec<'r> {
    registry: &'r Registry,
    recursion_limit: usize,
}

impl<'r> Codec<'r> {
    pub(crate) fn new(registry: &'r Registry) -> Self {
        Codec {
            registry,
            recursion_limit: registry.config().recursion_limit,
        }
    }

    // ==================== Validation ====================

    /// Everything `encode` would reject, checked before any byte is written.
    pub(crate) fn check_message(&self, m: &MessageAdapter, value: &MessageValue) -> Result<(), CodecError> {
        for (&tag, v) in &value.fields {
            let b = m
                .binding(tag)
                .ok_or_else(|| CodecError::TypeMismatch(format!("{} has no field {}", m.name, tag)))?;
            self.check_field(m, b, v)?;
        }
        for b in m.fields.iter().filter(|b| b.label == Label::Required) {
            if !value.has(b.tag) {
                return Err(CodecError::MissingRequired(format!("{}.{}", m.name, b.name)));
            }
        }
        for (i, oneof) in m.oneofs.iter().enumerate() {
            let set: Vec<&str> = m
                .fields
                .iter()
                .filter(|b| b.oneof == Some(i) && value.has(b.tag))
                .map(|b| b.name.as_str())
                .collect();
            if set.len() > 1 {
                return Err(CodecError::OneofConflict(format!(
                    "{}.{} has more than one member set: {}",
                    m.name,
                    oneof,
                    set.join(", ")
                )));
            }
        }
        Ok(())
    }

    fn check_field(&self, m: &MessageAdapter, b: &FieldBinding, v: &Value) -> Result<(), CodecError> {
        let context = || format!("{}.{}", m.name, b.name);
        match (&b.codec, v) {
            (FieldCodec::Map { key, value }, Value::Map(entries)) => {
                for (k, x) in entries {
                    scalar_size(*key, k).map_err(|_| mismatch(&context(), key.keyword(), k))?;
                    self.check_element(&context(), value, x)?;
                }
                Ok(())
            }
            (FieldCodec::Map { .. }, other) => Err(mismatch(&context(), "map", other)),
            (codec, Value::List(items)) if b.label == Label::Repeated => {
                for x in items {
                    self.check_element(&context(), codec, x)?;
                }
                Ok(())
            }
            (_, other) if b.label == Label::Repeated => Err(mismatch(&context(), "list", other)),
            (codec, x) => self.check_element(&context(), codec, x),
        }
    }

    fn check_element(&self, context: &str, codec: &FieldCodec, v: &Value) -> Result<(), CodecError> {
        match (codec, v) {
            (FieldCodec::Scalar(s), x) => scalar_size(*s, x).map(|_| ()).map_err(|_| mismatch(context, s.keyword(), x)),
            (FieldCodec::Enum { .. }, Value::Enum(_)) => Ok(()),
            (FieldCodec::Enum { .. }, x) => Err(mismatch(context, "enum", x)),
            (FieldCodec::Message(id), Value::Message(mv)) => self.check_message(self.registry.message(*id)?, mv),
            (FieldCodec::Message(_), x) => Err(mismatch(context, "message", x)),
            (FieldCodec::Map { .. }, x) => Err(mismatch(context, "map", x)),
        }
    }

    // ==================== Encode ====================

    pub(crate) fn encode_message<W: Write>(
        &self,
        w: &mut ProtoWriter<W>,
        m: &MessageAdapter,
        value: &MessageValue,
    ) -> Result<(), CodecError> {
        for b in &m.fields {
            if let Some(v) = value.get(b.tag) {
                self.encode_field(w, b, v)?;
            }
        }
        w.write_raw(&value.unknown)
    }

    fn encode_field<W: Write>(&self, w: &mut ProtoWriter<W>, b: &FieldBinding, v: &Value) -> Result<(), CodecError> {
        match (&b.codec, v) {
            (FieldCodec::Map { key, value }, Value::Map(entries)) => {
                let key_codec = FieldCodec::Scalar(*key);
                for (k, x) in entries {
                    w.write_tag(b.tag, WireType::LengthDelimited)?;
                    w.write_varint(self.entry_size(&key_codec, value, k, x)? as u64)?;
                    self.encode_element(w, 1, &key_codec, k)?;
                    self.encode_element(w, 2, value, x)?;
                }
                Ok(())
            }
            (codec, Value::List(items)) if b.label == Label::Repeated => {
                if b.packed {
                    if items.is_empty() {
                        return Ok(());
                    }
                    w.write_tag(b.tag, WireType::LengthDelimited)?;
                    w.write_varint(self.packed_size(codec, items)? as u64)?;
                    for x in items {
                        self.write_payload(w, codec, x)?;
                    }
                } else {
                    for x in items {
                        self.encode_element(w, b.tag, codec, x)?;
                    }
                }
                Ok(())
            }
            (codec, x) => self.encode_element(w, b.tag, codec, x),
        }
    }

    fn encode_element<W: Write>(
        &self,
        w: &mut ProtoWriter<W>,
        tag: u32,
        codec: &FieldCodec,
        v: &Value,
    ) -> Result<(), CodecError> {
        w.write_tag(tag, codec.wire_type())?;
        self.write_payload(w, codec, v)
    }

    fn write_payload<W: Write>(&self, w: &mut ProtoWriter<W>, codec: &FieldCodec, v: &Value) -> Result<(), CodecError> {
        match (codec, v) {
            (FieldCodec::Scalar(s), x) => encode_scalar(w, *s, x),
            (FieldCodec::Enum { .. }, Value::Enum(n)) => w.write_varint(*n as i64 as u64),
            (FieldCodec::Message(id), Value::Message(mv)) => {
                let m = self.registry.message(*id)?;
                w.write_varint(self.message_size(m, mv)? as u64)?;
                self.encode_message(w, m, mv)
            }
            (_, x) => Err(CodecError::TypeMismatch(format!("cannot encode {} here", x.kind_name()))),
        }
    }

    // ==================== Size ====================

    pub(crate) fn message_size(&self, m: &MessageAdapter, value: &MessageValue) -> Result<usize, CodecError> {
        let mut size = value.unknown.len();
        for b in &m.fields {
            if let Some(v) = value.get(b.tag) {
                size += self.field_size(b, v)?;
            }
        }
        Ok(size)
    }

    fn field_size(&self, b: &FieldBinding, v: &Value) -> Result<usize, CodecError> {
        let tag_size = wire::tag_size(b.tag);
        match (&b.codec, v) {
            (FieldCodec::Map { key, value }, Value::Map(entries)) => {
                let key_codec = FieldCodec::Scalar(*key);
                let mut size = 0;
                for (k, x) in entries {
                    let len = self.entry_size(&key_codec, value, k, x)?;
                    size += tag_size + wire::varint_size(len as u64) + len;
                }
                Ok(size)
            }
            (codec, Value::List(items)) if b.label == Label::Repeated => {
                if b.packed {
                    if items.is_empty() {
                        return Ok(0);
                    }
                    let len = self.packed_size(codec, items)?;
                    Ok(tag_size + wire::varint_size(len as u64) + len)
                } else {
                    let mut size = 0;
                    for x in items {
                        size += tag_size + self.payload_size(codec, x)?;
                    }
                    Ok(size)
                }
            }
            (codec, x) => Ok(tag_size + self.payload_size(codec, x)?),
        }
    }

    fn packed_size(&self, codec: &FieldCodec, items: &[Value]) -> Result<usize, CodecError> {
        let mut size = 0;
        for x in items {
            size += self.payload_size(codec, x)?;
        }
        Ok(size)
    }

    fn entry_size(&self, key: &FieldCodec, value: &FieldCodec, k: &Value, v: &Value) -> Result<usize, CodecError> {
        Ok(wire::tag_size(1) + self.payload_size(key, k)? + wire::tag_size(2) + self.payload_size(value, v)?)
    }

    fn payload_size(&self, codec: &FieldCodec, v: &Value) -> Result<usize, CodecError> {
        match (codec, v) {
            (FieldCodec::Scalar(s), x) => scalar_size(*s, x),
            (FieldCodec::Enum { .. }, Value::Enum(n)) => Ok(wire::varint_size(*n as i64 as u64)),
            (FieldCodec::Message(id), Value::Message(mv)) => {
                let len = self.message_size(self.registry.message(*id)?, mv)?;
                Ok(wire::varint_size(len as u64) + len)
            }
            (_, x) => Err(CodecError::TypeMismatch(format!("cannot size {} here", x.kind_name()))),
        }
    }

    // ==================== Decode ====================

    /// Merge every field in `r` into `dst`. Callers wanting all-or-nothing
    /// semantics pass a scratch copy.
    pub(crate) fn merge_message(
        &self,
        m: &MessageAdapter,
        r: &mut ProtoReader<'_>,
        dst: &mut MessageValue,
        depth: usize,
    ) -> Result<(), CodecError> {
        if depth > self.recursion_limit {
            return Err(CodecError::RecursionLimit(self.recursion_limit));
        }
        while !r.is_at_end() {
            let start = r.position();
            let (number, wire_type) = r.read_tag()?;
            match m.binding(number) {
                Some(b) => self.merge_field(m, b, wire_type, r, start, dst, depth)?,
                None => {
                    r.skip_field(number, wire_type)?;
                    dst.unknown.extend_from_slice(r.slice_from(start));
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_field(
        &self,
        m: &MessageAdapter,
        b: &FieldBinding,
        wire_type: WireType,
        r: &mut ProtoReader<'_>,
        start: usize,
        dst: &mut MessageValue,
        depth: usize,
    ) -> Result<(), CodecError> {
        match &b.codec {
            FieldCodec::Map { key, value } => {
                expect_wire_type(m, b, WireType::LengthDelimited, wire_type)?;
                let payload = r.read_length_delimited()?;
                match self.decode_entry(*key, value, payload, depth)? {
                    Some((k, v)) => insert_entry(dst, b.tag, k, v),
                    None => dst.unknown.extend_from_slice(r.slice_from(start)),
                }
            }
            codec if b.label == Label::Repeated => {
                if wire_type == WireType::LengthDelimited && codec.is_packable() {
                    let payload = r.read_length_delimited()?;
                    let mut packed = ProtoReader::new(payload);
                    let mut items = Vec::new();
                    while !packed.is_at_end() {
                        let x = self.read_payload(&mut packed, codec, depth)?;
                        if codec.accepts(&x) {
                            items.push(x);
                        } else if let Value::Enum(n) = x {
                            let mut w = ProtoWriter::new(&mut dst.unknown);
                            w.write_tag(b.tag, WireType::Varint)?;
                            w.write_varint(n as i64 as u64)?;
                        }
                    }
                    append(dst, b.tag, items);
                } else {
                    expect_wire_type(m, b, codec.wire_type(), wire_type)?;
                    let x = self.read_payload(r, codec, depth)?;
                    if codec.accepts(&x) {
                        append(dst, b.tag, vec![x]);
                    } else {
                        dst.unknown.extend_from_slice(r.slice_from(start));
                    }
                }
            }
            FieldCodec::Message(id) => {
                expect_wire_type(m, b, WireType::LengthDelimited, wire_type)?;
                let payload = r.read_length_delimited()?;
                let sub = self.registry.message(*id)?;
                let mut current = match dst.fields.remove(&b.tag) {
                    Some(Value::Message(existing)) => existing,
                    _ => MessageValue::default(),
                };
                self.merge_message(sub, &mut ProtoReader::new(payload), &mut current, depth + 1)?;
                clear_oneof_siblings(m, b, dst);
                dst.fields.insert(b.tag, Value::Message(current));
            }
            codec => {
                expect_wire_type(m, b, codec.wire_type(), wire_type)?;
                let x = self.read_payload(r, codec, depth)?;
                if codec.accepts(&x) {
                    clear_oneof_siblings(m, b, dst);
                    dst.fields.insert(b.tag, x);
                } else {
                    dst.unknown.extend_from_slice(r.slice_from(start));
                }
            }
        }
        Ok(())
    }

    fn read_payload(&self, r: &mut ProtoReader<'_>, codec: &FieldCodec, depth: usize) -> Result<Value, CodecError> {
        match codec {
            FieldCodec::Scalar(s) => decode_scalar(r, *s),
            FieldCodec::Enum { .. } => Ok(Value::Enum(r.read_varint()? as i32)),
            FieldCodec::Message(id) => {
                let payload = r.read_length_delimited()?;
                let mut mv = MessageValue::default();
                self.merge_message(self.registry.message(*id)?, &mut ProtoReader::new(payload), &mut mv, depth + 1)?;
                Ok(Value::Message(mv))
            }
            FieldCodec::Map { .. } => Err(CodecError::CorruptData("map value cannot itself be a map".to_string())),
        }
    }

    /// Key and value of one map entry; missing halves take their type's default.
    /// `None` when the value is a number its closed enum does not declare.
    fn decode_entry(
        &self,
        key: ScalarType,
        value: &FieldCodec,
        payload: &[u8],
        depth: usize,
    ) -> Result<Option<(Value, Value)>, CodecError> {
        let mut r = ProtoReader::new(payload);
        let mut k = scalar_default(key);
        let mut v = value.default_value();
        while !r.is_at_end() {
            let (number, wire_type) = r.read_tag()?;
            match number {
                1 if wire_type == key.wire_type() => k = decode_scalar(&mut r, key)?,
                2 if wire_type == value.wire_type() => v = self.read_payload(&mut r, value, depth)?,
                1 | 2 => {
                    return Err(CodecError::CorruptData(format!(
                        "map entry field {} has wire type {:?}",
                        number, wire_type
                    )))
                }
                _ => r.skip_field(number, wire_type)?,
            }
        }
        if value.accepts(&v) {
            Ok(Some((k, v)))
        } else {
            Ok(None)
        }
    }

    // ==================== Redact ====================

    pub(crate) fn redact_message(&self, m: &MessageAdapter, value: &MessageValue) -> Result<MessageValue, CodecError> {
        let mut out = MessageValue::default();
        for (&tag, v) in &value.fields {
            match m.binding(tag) {
                Some(b) if b.redacted => {}
                Some(b) => {
                    out.fields.insert(tag, self.redact_value(&b.codec, v)?);
                }
                None => {
                    out.fields.insert(tag, v.clone());
                }
            }
        }
        Ok(out)
    }

    fn redact_value(&self, codec: &FieldCodec, v: &Value) -> Result<Value, CodecError> {
        Ok(match (codec, v) {
            (FieldCodec::Message(id), Value::Message(mv)) => Value::Message(self.redact_message(self.registry.message(*id)?, mv)?),
            (FieldCodec::Map { value, .. }, Value::Map(entries)) => Value::Map(
                entries
                    .iter()
                    .map(|(k, x)| Ok((k.clone(), self.redact_value(value, x)?)))
                    .collect::<Result<_, CodecError>>()?,
            ),
            (codec, Value::List(items)) => Value::List(
                items
                    .iter()
                    .map(|x| self.redact_value(codec, x))
                    .collect::<Result<_, CodecError>>()?,
            ),
            (_, x) => x.clone(),
        })
    }
}

fn expect_wire_type(m: &MessageAdapter, b: &FieldBinding, expected: WireType, actual: WireType) -> Result<(), CodecError> {
    if expected == actual {
        Ok(())
    } else {
        Err(CodecError::CorruptData(format!(
            "{}.{} (field {}) expects wire type {:?}, got {:?}",
            m.name, b.name, b.tag, expected, actual
        )))
    }
}

fn mismatch(context: &str, expected: &str, actual: &Value) -> CodecError {
    CodecError::TypeMismatch(format!("{}: expected {}, got {}", context, expected, actual.kind_name()))
}

/// Last writer wins: setting one oneof member clears the others.
fn clear_oneof_siblings(m: &MessageAdapter, b: &FieldBinding, dst: &mut MessageValue) {
    if let Some(group) = b.oneof {
        for other in m.fields.iter().filter(|o| o.oneof == Some(group) && o.tag != b.tag) {
            dst.fields.remove(&other.tag);
        }
    }
}

fn append(dst: &mut MessageValue, tag: u32, items: Vec<Value>) {
    let slot = dst.fields.entry(tag).or_insert_with(|| Value::List(Vec::new()));
    if let Value::List(existing) = slot {
        existing.extend(items);
    } else {
        *slot = Value::List(items);
    }
}

/// A repeated key replaces the earlier entry's value in place.
fn insert_entry(dst: &mut MessageValue, tag: u32, k: Value, v: Value) {
    let slot = dst.fields.entry(tag).or_insert_with(|| Value::Map(Vec::new()));
    if let Value::Map(entries) = slot {
        match entries.iter_mut().find(|e| e.0 == k) {
            Some(e) => e.1 = v,
            None => entries.push((k, v)),
        }
    } else {
        *slot = Value::Map(vec![(k, v)]);
    }
}

// ==================== Scalars ====================

pub fn scalar_default(kind: ScalarType) -> Value {
    match kind {
        ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => Value::I32(0),
        ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => Value::I64(0),
        ScalarType::Uint32 | ScalarType::Fixed32 => Value::U32(0),
        ScalarType::Uint64 | ScalarType::Fixed64 => Value::U64(0),
        ScalarType::Float => Value::F32(0.0),
        ScalarType::Double => Value::F64(0.0),
        ScalarType::Bool => Value::Bool(false),
        ScalarType::String => Value::String(String::new()),
        ScalarType::Bytes => Value::Bytes(Vec::new()),
    }
}

/// Write the payload of one scalar (no tag). Strings and bytes carry their length prefix.
pub fn encode_scalar<W: Write>(w: &mut ProtoWriter<W>, kind: ScalarType, value: &Value) -> Result<(), CodecError> {
    match (kind, value) {
        (ScalarType::Int32, Value::I32(x)) => w.write_varint(*x as i64 as u64),
        (ScalarType::Int64, Value::I64(x)) => w.write_varint(*x as u64),
        (ScalarType::Uint32, Value::U32(x)) => w.write_varint(*x as u64),
        (ScalarType::Uint64, Value::U64(x)) => w.write_varint(*x),
        (ScalarType::Sint32, Value::I32(x)) => w.write_varint(wire::zigzag32(*x) as u64),
        (ScalarType::Sint64, Value::I64(x)) => w.write_varint(wire::zigzag64(*x)),
        (ScalarType::Bool, Value::Bool(b)) => w.write_varint(*b as u64),
        (ScalarType::Fixed32, Value::U32(x)) => w.write_fixed32(*x),
        (ScalarType::Sfixed32, Value::I32(x)) => w.write_fixed32(*x as u32),
        (ScalarType::Float, Value::F32(x)) => w.write_fixed32(x.to_bits()),
        (ScalarType::Fixed64, Value::U64(x)) => w.write_fixed64(*x),
        (ScalarType::Sfixed64, Value::I64(x)) => w.write_fixed64(*x as u64),
        (ScalarType::Double, Value::F64(x)) => w.write_fixed64(x.to_bits()),
        (ScalarType::String, Value::String(s)) => w.write_bytes(s.as_bytes()),
        (ScalarType::Bytes, Value::Bytes(b)) => w.write_bytes(b),
        (kind, v) => Err(mismatch("scalar", kind.keyword(), v)),
    }
}

/// Encoded payload length of one scalar, length prefix included.
pub fn scalar_size(kind: ScalarType, value: &Value) -> Result<usize, CodecError> {
    Ok(match (kind, value) {
        (ScalarType::Int32, Value::I32(x)) => wire::varint_size(*x as i64 as u64),
        (ScalarType::Int64, Value::I64(x)) => wire::varint_size(*x as u64),
        (ScalarType::Uint32, Value::U32(x)) => wire::varint_size(*x as u64),
        (ScalarType::Uint64, Value::U64(x)) => wire::varint_size(*x),
        (ScalarType::Sint32, Value::I32(x)) => wire::varint_size(wire::zigzag32(*x) as u64),
        (ScalarType::Sint64, Value::I64(x)) => wire::varint_size(wire::zigzag64(*x)),
        (ScalarType::Bool, Value::Bool(_)) => 1,
        (ScalarType::Fixed32, Value::U32(_))
        | (ScalarType::Sfixed32, Value::I32(_))
        | (ScalarType::Float, Value::F32(_)) => 4,
        (ScalarType::Fixed64, Value::U64(_))
        | (ScalarType::Sfixed64, Value::I64(_))
        | (ScalarType::Double, Value::F64(_)) => 8,
        (ScalarType::String, Value::String(s)) => wire::varint_size(s.len() as u64) + s.len(),
        (ScalarType::Bytes, Value::Bytes(b)) => wire::varint_size(b.len() as u64) + b.len(),
        (kind, v) => return Err(mismatch("scalar", kind.keyword(), v)),
    })
}

pub fn decode_scalar(r: &mut ProtoReader<'_>, kind: ScalarType) -> Result<Value, CodecError> {
    Ok(match kind {
        ScalarType::Int32 => Value::I32(r.read_varint()? as i32),
        ScalarType::Int64 => Value::I64(r.read_varint()? as i64),
        ScalarType::Uint32 => Value::U32(r.read_varint()? as u32),
        ScalarType::Uint64 => Value::U64(r.read_varint()?),
        ScalarType::Sint32 => Value::I32(wire::unzigzag32(r.read_varint()? as u32)),
        ScalarType::Sint64 => Value::I64(wire::unzigzag64(r.read_varint()?)),
        ScalarType::Bool => Value::Bool(r.read_varint()? != 0),
        ScalarType::Fixed32 => Value::U32(r.read_fixed32()?),
        ScalarType::Sfixed32 => Value::I32(r.read_fixed32()? as i32),
        ScalarType::Float => Value::F32(f32::from_bits(r.read_fixed32()?)),
        ScalarType::Fixed64 => Value::U64(r.read_fixed64()?),
        ScalarType::Sfixed64 => Value::I64(r.read_fixed64()? as i64),
        ScalarType::Double => Value::F64(f64::from_bits(r.read_fixed64()?)),
        ScalarType::String => {
            let bytes = r.read_length_delimited()?;
            let s = std::str::from_utf8(bytes).map_err(|e| CodecError::CorruptData(format!("invalid UTF-8 in string: {}", e)))?;
            Value::String(s.to_string())
        }
        ScalarType::Bytes => Value::Bytes(r.read_length_delimited()?.to_vec()),
    })
}
