//! Adapter registry: encode/decode/size entry points per message type and scalar kind.
//!
//! [`Registry::new`] reserves one slot per message type in the schema without
//! building anything. A slot's [`MessageAdapter`] is built on first use, exactly
//! once, and refers to other message types only by [`AdapterId`]; those ids are
//! looked up again at call time, so self- and mutually-referential types need no
//! construction order.

use crate::ast::ScalarType;
use crate::codec::{self, Codec, CodecError, FieldBinding, FieldCodec, MessageAdapter};
use crate::config::CodecConfig;
use crate::schema::{FieldKind, Schema, Type};
use crate::value::{MessageValue, Value};
use crate::wire::{ProtoReader, ProtoWriter};
use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, OnceLock};
use tracing::trace;

/// Handle to a message adapter slot in a [`Registry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdapterId(usize);

#[derive(Debug)]
pub struct Registry {
    schema: Arc<Schema>,
    config: CodecConfig,
    index: HashMap<String, AdapterId>,
    names: Vec<String>,
    slots: Vec<OnceLock<Result<MessageAdapter, String>>>,
}

impl Registry {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self::with_config(schema, CodecConfig::default())
    }

    pub fn with_config(schema: Arc<Schema>, config: CodecConfig) -> Self {
        let names: Vec<String> = schema
            .types()
            .iter()
            .filter_map(Type::as_message)
            .map(|m| m.name.clone())
            .collect();
        let index = names.iter().enumerate().map(|(i, n)| (n.clone(), AdapterId(i))).collect();
        let slots = names.iter().map(|_| OnceLock::new()).collect();
        Registry {
            schema,
            config,
            index,
            names,
            slots,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn id(&self, type_name: &str) -> Option<AdapterId> {
        self.index.get(type_name.trim_start_matches('.')).copied()
    }

    /// Adapter for a message type by fully qualified name.
    pub fn adapter(&self, type_name: &str) -> Result<ProtoAdapter<'_>, CodecError> {
        let id = self
            .id(type_name)
            .ok_or_else(|| CodecError::UnknownType(type_name.to_string()))?;
        self.adapter_by_id(id)
    }

    pub fn adapter_by_id(&self, id: AdapterId) -> Result<ProtoAdapter<'_>, CodecError> {
        Ok(ProtoAdapter {
            registry: self,
            id,
            message: self.message(id)?,
        })
    }

    /// Payload-only adapter for one scalar kind.
    pub fn scalar(&self, kind: ScalarType) -> ScalarAdapter {
        ScalarAdapter { kind }
    }

    /// Build every slot now instead of on first use.
    pub fn warm(&self) -> Result<(), CodecError> {
        for i in 0..self.slots.len() {
            self.message(AdapterId(i))?;
        }
        Ok(())
    }

    pub(crate) fn message(&self, id: AdapterId) -> Result<&MessageAdapter, CodecError> {
        let slot = self
            .slots
            .get(id.0)
            .ok_or_else(|| CodecError::UnknownType(format!("adapter #{}", id.0)))?;
        slot.get_or_init(|| self.build(id))
            .as_ref()
            .map_err(|e| CodecError::UnknownType(e.clone()))
    }

    fn build(&self, id: AdapterId) -> Result<MessageAdapter, String> {
        let name = &self.names[id.0];
        let message = self
            .schema
            .message(name)
            .ok_or_else(|| format!("{} is not a message type", name))?;
        let adapter = MessageAdapter::new(message, |kind| self.bind(kind))?;
        trace!(adapter = %name, fields = adapter.fields.len(), "adapter constructed");
        Ok(adapter)
    }

    /// Field codec for a linked field kind; message types become slot ids only.
    fn bind(&self, kind: &FieldKind) -> Result<FieldCodec, String> {
        Ok(match kind {
            FieldKind::Scalar(s) => FieldCodec::Scalar(*s),
            FieldKind::Enum { type_name, closed } => {
                let known = if *closed {
                    let e = self
                        .schema
                        .enum_type(type_name)
                        .ok_or_else(|| format!("{} is not an enum type", type_name))?;
                    Some(e.constants.iter().map(|c| c.number).collect::<Arc<[i32]>>())
                } else {
                    None
                };
                FieldCodec::Enum { closed: known }
            }
            FieldKind::Message(type_name) => {
                FieldCodec::Message(self.id(type_name).ok_or_else(|| format!("{} is not a message type", type_name))?)
            }
            FieldKind::Map { key, value, .. } => FieldCodec::Map {
                key: *key,
                value: Box::new(self.bind(value)?),
            },
        })
    }
}

/// Encode/decode/size/redact for one message type.
///
/// Adapters hold no per-call state; one may be shared across threads as long as
/// each call brings its own output.
#[derive(Clone, Copy)]
pub struct ProtoAdapter<'r> {
    registry: &'r Registry,
    id: AdapterId,
    message: &'r MessageAdapter,
}

impl<'r> ProtoAdapter<'r> {
    pub fn id(&self) -> AdapterId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.message.name
    }

    pub fn fields(&self) -> &[FieldBinding] {
        &self.message.fields
    }

    /// Field number for a declared field name.
    pub fn tag(&self, field_name: &str) -> Option<u32> {
        self.message.binding_named(field_name).map(|b| b.tag)
    }

    fn codec(&self) -> Codec<'r> {
        Codec::new(self.registry)
    }

    /// Encoded length, equal to what [`ProtoAdapter::encode`] produces.
    pub fn size(&self, value: &MessageValue) -> Result<usize, CodecError> {
        self.codec().message_size(self.message, value)
    }

    pub fn encode(&self, value: &MessageValue) -> Result<Vec<u8>, CodecError> {
        let codec = self.codec();
        codec.check_message(self.message, value)?;
        let mut w = ProtoWriter::new(Vec::with_capacity(codec.message_size(self.message, value)?));
        codec.encode_message(&mut w, self.message, value)?;
        Ok(w.into_inner())
    }

    /// Encode to a sink. Nothing is written if the value is rejected.
    pub fn encode_to<W: Write>(&self, value: &MessageValue, sink: W) -> Result<(), CodecError> {
        let codec = self.codec();
        codec.check_message(self.message, value)?;
        codec.encode_message(&mut ProtoWriter::new(sink), self.message, value)
    }

    /// Encode with a varint length prefix, for streams of messages.
    pub fn encode_delimited(&self, value: &MessageValue) -> Result<Vec<u8>, CodecError> {
        let codec = self.codec();
        codec.check_message(self.message, value)?;
        let size = codec.message_size(self.message, value)?;
        let mut w = ProtoWriter::new(Vec::with_capacity(size + crate::wire::MAX_VARINT_LEN));
        w.write_varint(size as u64)?;
        codec.encode_message(&mut w, self.message, value)?;
        Ok(w.into_inner())
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<MessageValue, CodecError> {
        let mut value = MessageValue::default();
        self.codec()
            .merge_message(self.message, &mut ProtoReader::new(bytes), &mut value, 0)?;
        Ok(value)
    }

    /// Decode one length-prefixed message from the front of `bytes`, returning it
    /// and the number of bytes consumed.
    pub fn decode_delimited(&self, bytes: &[u8]) -> Result<(MessageValue, usize), CodecError> {
        let mut r = ProtoReader::new(bytes);
        let payload = r.read_length_delimited()?;
        Ok((self.decode(payload)?, r.position()))
    }

    /// Merge `bytes` into `dst`. On error `dst` is left as it was.
    pub fn decode_into(&self, bytes: &[u8], dst: &mut MessageValue) -> Result<(), CodecError> {
        let mut scratch = dst.clone();
        self.codec()
            .merge_message(self.message, &mut ProtoReader::new(bytes), &mut scratch, 0)?;
        *dst = scratch;
        Ok(())
    }

    /// Copy of `value` without redacted fields or unknown bytes, for logging.
    pub fn redact(&self, value: &MessageValue) -> Result<MessageValue, CodecError> {
        self.codec().redact_message(self.message, value)
    }
}

impl std::fmt::Debug for ProtoAdapter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtoAdapter").field("name", &self.message.name).field("id", &self.id).finish()
    }
}

/// Payload codec for a bare scalar: no tag is written or expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarAdapter {
    kind: ScalarType,
}

impl ScalarAdapter {
    pub fn kind(&self) -> ScalarType {
        self.kind
    }

    pub fn size(&self, value: &Value) -> Result<usize, CodecError> {
        codec::scalar_size(self.kind, value)
    }

    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let mut w = ProtoWriter::new(Vec::with_capacity(self.size(value)?));
        codec::encode_scalar(&mut w, self.kind, value)?;
        Ok(w.into_inner())
    }

    pub fn encode_to<W: Write>(&self, value: &Value, sink: W) -> Result<(), CodecError> {
        self.size(value)?;
        codec::encode_scalar(&mut ProtoWriter::new(sink), self.kind, value)
    }

    /// Value and bytes consumed.
    pub fn decode(&self, bytes: &[u8]) -> Result<(Value, usize), CodecError> {
        let mut r = ProtoReader::new(bytes);
        let value = codec::decode_scalar(&mut r, self.kind)?;
        Ok((value, r.position()))
    }
}
