//! Typing option names and literals against the option schema.
//!
//! An option name such as `(acme.rules).max_len` is resolved one part at a
//! time: plain parts are fields of the current options message, parenthesized
//! parts are extensions of it. The literal is then checked against the last
//! field's type and converted into a [`Value`].

use crate::ast::{Location, OptionElement, OptionValue, ScalarType};
use crate::parser::parse_int;
use crate::schema::{EnumType, Field, FieldKind, MessageType};
use crate::value::{MessageValue, Value};

/// An option after linking.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedOption {
    pub location: Location,
    /// Name as written, e.g. `deprecated` or `(acme.rules).max_len`.
    pub name: String,
    /// Full name of the option field behind each name part.
    pub path: Vec<String>,
    pub value: Value,
}

impl ResolvedOption {
    /// Simple name of the option field the value was assigned to.
    pub fn field_name(&self) -> &str {
        let last = self.path.last().map(String::as_str).unwrap_or("");
        last.rsplit('.').next().unwrap_or(last)
    }

    /// `[(any.pkg.redacted) = true]` and the like.
    pub fn is_redaction(&self) -> bool {
        self.field_name() == "redacted" && self.value == Value::Bool(true)
    }
}

/// Options messages for each kind of declaration.
pub const FILE_OPTIONS: &str = "google.protobuf.FileOptions";
pub const MESSAGE_OPTIONS: &str = "google.protobuf.MessageOptions";
pub const FIELD_OPTIONS: &str = "google.protobuf.FieldOptions";
pub const ONEOF_OPTIONS: &str = "google.protobuf.OneofOptions";
pub const ENUM_OPTIONS: &str = "google.protobuf.EnumOptions";
pub const ENUM_VALUE_OPTIONS: &str = "google.protobuf.EnumValueOptions";
pub const SERVICE_OPTIONS: &str = "google.protobuf.ServiceOptions";
pub const METHOD_OPTIONS: &str = "google.protobuf.MethodOptions";

/// Read access to linked types, plus extension lookup from the scope the
/// option appears in.
pub(crate) trait OptionContext {
    fn message(&self, name: &str) -> Option<&MessageType>;
    fn enum_type(&self, name: &str) -> Option<&EnumType>;
    fn extension(&self, name: &str) -> Option<&Field>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum OptionFailure {
    /// The name resolves to nothing.
    Unknown(String),
    /// The name resolves but the value does not fit.
    Invalid(String),
}

pub(crate) fn resolve(
    ctx: &impl OptionContext,
    options_type: &str,
    element: &OptionElement,
) -> Result<ResolvedOption, OptionFailure> {
    let display = element.display_name();
    let mut message_name = options_type.to_string();
    let mut path = Vec::new();
    for (i, part) in element.name.iter().enumerate() {
        let message = ctx
            .message(&message_name)
            .ok_or_else(|| OptionFailure::Invalid(format!("{} is not a message type", message_name)))?;
        let field = if part.extension {
            let f = ctx
                .extension(&part.name)
                .ok_or_else(|| OptionFailure::Unknown(format!("unknown option ({})", part.name)))?;
            if f.extendee.as_deref() != Some(message.name.as_str()) {
                return Err(OptionFailure::Invalid(format!(
                    "option ({}) extends {}, not {}",
                    part.name,
                    f.extendee.as_deref().unwrap_or("nothing"),
                    message.name
                )));
            }
            f
        } else {
            message
                .field_named(&part.name)
                .ok_or_else(|| OptionFailure::Unknown(format!("{} has no option named '{}'", message.name, part.name)))?
        };
        path.push(field.full_name.clone());
        if i + 1 == element.name.len() {
            let value = typed(ctx, field, &element.value)
                .map_err(|e| OptionFailure::Invalid(format!("option '{}': {}", display, e)))?;
            return Ok(ResolvedOption {
                location: element.location.clone(),
                name: display,
                path,
                value,
            });
        }
        match &field.kind {
            FieldKind::Message(next) if !field.is_repeated() => message_name = next.clone(),
            _ => {
                return Err(OptionFailure::Invalid(format!(
                    "option '{}': {} is not a message, so it has no sub-fields",
                    display, field.full_name
                )))
            }
        }
    }
    Err(OptionFailure::Invalid("empty option name".to_string()))
}

/// Convert a literal for `field`, wrapping repeated fields in a list.
pub(crate) fn typed(ctx: &impl OptionContext, field: &Field, value: &OptionValue) -> Result<Value, String> {
    if field.is_map() {
        return Err(format!("map field {} cannot be set from an option literal", field.name));
    }
    if field.is_repeated() {
        let items = match value {
            OptionValue::List(items) => items
                .iter()
                .map(|v| typed_element(ctx, &field.kind, v))
                .collect::<Result<Vec<_>, _>>()?,
            v => vec![typed_element(ctx, &field.kind, v)?],
        };
        return Ok(Value::List(items));
    }
    if let OptionValue::List(_) = value {
        return Err(format!("{} is not repeated, a list is not allowed", field.name));
    }
    typed_element(ctx, &field.kind, value)
}

pub(crate) fn typed_element(ctx: &impl OptionContext, kind: &FieldKind, value: &OptionValue) -> Result<Value, String> {
    match kind {
        FieldKind::Scalar(s) => typed_scalar(*s, value),
        FieldKind::Enum { type_name, .. } => {
            let e = ctx
                .enum_type(type_name)
                .ok_or_else(|| format!("{} is not an enum type", type_name))?;
            match value {
                OptionValue::Enum(name) => e
                    .constant(name)
                    .map(|c| Value::Enum(c.number))
                    .ok_or_else(|| format!("enum {} has no value named {}", e.name, name)),
                other => Err(format!("expected a constant of enum {}, got {}", e.name, other.kind_name())),
            }
        }
        FieldKind::Message(type_name) => {
            let message = ctx
                .message(type_name)
                .ok_or_else(|| format!("{} is not a message type", type_name))?;
            match value {
                OptionValue::Aggregate(entries) => typed_aggregate(ctx, message, entries).map(Value::Message),
                other => Err(format!("expected a {} literal, got {}", message.name, other.kind_name())),
            }
        }
        FieldKind::Map { .. } => Err("map values cannot be set from an option literal".to_string()),
    }
}

fn typed_aggregate(ctx: &impl OptionContext, message: &MessageType, entries: &[OptionElement]) -> Result<MessageValue, String> {
    let mut out = MessageValue::default();
    for entry in entries {
        let part = entry.name.first().ok_or_else(|| "empty field name".to_string())?;
        let field = if part.extension {
            ctx.extension(&part.name)
                .filter(|f| f.extendee.as_deref() == Some(message.name.as_str()))
                .ok_or_else(|| format!("{} has no extension [{}]", message.name, part.name))?
        } else {
            message
                .field_named(&part.name)
                .ok_or_else(|| format!("{} has no field named {}", message.name, part.name))?
        };
        let v = typed(ctx, field, &entry.value)?;
        match out.fields.remove(&field.tag) {
            None => {
                out.fields.insert(field.tag, v);
            }
            Some(Value::List(mut existing)) if field.is_repeated() => {
                if let Value::List(more) = v {
                    existing.extend(more);
                }
                out.fields.insert(field.tag, Value::List(existing));
            }
            Some(_) => return Err(format!("{} is set more than once", field.name)),
        }
    }
    Ok(out)
}

fn typed_scalar(kind: ScalarType, value: &OptionValue) -> Result<Value, String> {
    let wrong = || format!("expected {}, got {}", kind.keyword(), value.kind_name());
    match kind {
        ScalarType::Bool => match value {
            OptionValue::Bool(b) => Ok(Value::Bool(*b)),
            OptionValue::Str(s) if s == b"true" || s == b"false" => Ok(Value::Bool(s == b"true")),
            OptionValue::Enum(s) if s == "true" || s == "false" => Ok(Value::Bool(s == "true")),
            _ => Err(wrong()),
        },
        ScalarType::String => match value {
            OptionValue::Str(s) => String::from_utf8(s.clone())
                .map(Value::String)
                .map_err(|_| "string value is not valid UTF-8".to_string()),
            _ => Err(wrong()),
        },
        ScalarType::Bytes => match value {
            OptionValue::Str(s) => Ok(Value::Bytes(s.clone())),
            _ => Err(wrong()),
        },
        ScalarType::Float | ScalarType::Double => {
            let OptionValue::Number(text) = value else {
                return Err(wrong());
            };
            let x = parse_float(text).ok_or_else(|| format!("invalid number: {}", text))?;
            Ok(if kind == ScalarType::Float {
                Value::F32(x as f32)
            } else {
                Value::F64(x)
            })
        }
        _ => {
            let OptionValue::Number(text) = value else {
                return Err(wrong());
            };
            let n = parse_signed(text).ok_or_else(|| format!("expected an integer, got {}", text))?;
            let out_of_range = || format!("{} is out of range for {}", text, kind.keyword());
            match kind {
                ScalarType::Int32 | ScalarType::Sint32 | ScalarType::Sfixed32 => {
                    i32::try_from(n).map(Value::I32).map_err(|_| out_of_range())
                }
                ScalarType::Int64 | ScalarType::Sint64 | ScalarType::Sfixed64 => {
                    i64::try_from(n).map(Value::I64).map_err(|_| out_of_range())
                }
                ScalarType::Uint32 | ScalarType::Fixed32 => u32::try_from(n).map(Value::U32).map_err(|_| out_of_range()),
                _ => u64::try_from(n).map(Value::U64).map_err(|_| out_of_range()),
            }
        }
    }
}

fn parse_signed(text: &str) -> Option<i128> {
    match text.strip_prefix('-') {
        Some(digits) => parse_int(digits).map(|n| -(n as i128)),
        None => parse_int(text).map(|n| n as i128),
    }
}

fn parse_float(text: &str) -> Option<f64> {
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let x = match body {
        "inf" => f64::INFINITY,
        "nan" => f64::NAN,
        _ if body.starts_with("0x") || body.starts_with("0X") => parse_int(body)? as f64,
        _ => body.parse().ok()?,
    };
    Some(if negative { -x } else { x })
}
