//! Schema-guided transcoding between protobuf wire data and JSON values.

use base64::prelude::*;
use serde_json::{Map, Number, Value};
use tracing::trace;

use crate::config::{BytesEncoding, FieldNaming, MapperConfig};
use crate::error::{MapperError, Result};
use crate::schema::{FieldDescriptor, FieldKind, MessageSchema};
use crate::varint::{zigzag_decode, zigzag_encode};
use crate::wire::{WireField, WireType, WireValue, encode_key, read_fields};

/// Nesting limit for messages, matching the usual protobuf recursion limit.
const MAX_DEPTH: usize = 100;

/// Converts protobuf wire data to JSON and back, using a [`MessageSchema`] to name fields and
/// interpret raw values.
#[derive(Debug, Clone, Copy)]
pub struct Transcoder<'a> {
    config: &'a MapperConfig,
}

impl<'a> Transcoder<'a> {
    pub fn new(config: &'a MapperConfig) -> Self {
        Self { config }
    }

    /// Decode a protobuf message into a JSON object whose keys follow schema declaration order.
    pub fn decode(&self, data: &[u8], schema: &MessageSchema) -> Result<Map<String, Value>> {
        self.decode_message(data, schema, 0)
    }

    /// Encode a JSON object into protobuf wire data.
    pub fn encode(&self, value: &Value, schema: &MessageSchema) -> Result<Vec<u8>> {
        let mut out = vec![];
        self.encode_message(value, schema, 0, &mut out)?;
        Ok(out)
    }

    fn decode_message(
        &self,
        data: &[u8],
        schema: &MessageSchema,
        depth: usize,
    ) -> Result<Map<String, Value>> {
        if depth > MAX_DEPTH {
            return Err(MapperError::conversion(format!(
                "message nesting exceeds {MAX_DEPTH} levels"
            )));
        }

        // one slot per declared field, filled in wire order
        let mut slots: Vec<Vec<Value>> = vec![vec![]; schema.fields.len()];

        for field in read_fields(data)? {
            let Some((idx, desc)) = schema.field_by_number(field.number) else {
                trace!(
                    schema = schema.name,
                    number = field.number,
                    "skipping undeclared wire field"
                );
                continue;
            };

            match field.value {
                WireValue::LengthDelimited(bytes) if desc.repeated && desc.kind.is_packable() => {
                    let wire_type = wire_type_of(&desc.kind);
                    let mut rest = bytes;
                    while !rest.is_empty() {
                        let value = WireValue::decode(&mut rest, wire_type)?;
                        slots[idx].push(self.decode_value(desc, value, depth)?);
                    }
                }
                value => slots[idx].push(self.decode_value(desc, value, depth)?),
            }
        }

        let mut map = Map::new();
        for (desc, mut values) in schema.fields.iter().zip(slots) {
            let value = if desc.repeated {
                if values.is_empty() && !self.config.emit_default_values {
                    continue;
                }
                Value::Array(values)
            } else if let Some(last) = values.pop() {
                last
            } else if let Some(default) = self.default_value(desc) {
                default
            } else {
                continue;
            };
            map.insert(self.json_key(desc), value);
        }

        Ok(map)
    }

    fn decode_value(
        &self,
        desc: &FieldDescriptor,
        value: WireValue<'_>,
        depth: usize,
    ) -> Result<Value> {
        let expected = wire_type_of(&desc.kind);
        if value.wire_type() != expected {
            return Err(MapperError::conversion(format!(
                "field `{}`: wire type {} does not match declared type {}",
                desc.name,
                value.wire_type().as_u8(),
                desc.kind.type_name()
            )));
        }

        let json = match (desc.kind, value) {
            (FieldKind::Double, WireValue::Fixed64(v)) => float_to_json(f64::from_bits(v)),
            (FieldKind::Float, WireValue::Fixed32(v)) => float32_to_json(f32::from_bits(v)),
            (FieldKind::Int32, WireValue::Varint(v)) => Value::from(v as i32),
            (FieldKind::Int64, WireValue::Varint(v)) => Value::from(v as i64),
            (FieldKind::UInt32, WireValue::Varint(v)) => Value::from(v as u32),
            (FieldKind::UInt64, WireValue::Varint(v)) => Value::from(v),
            (FieldKind::SInt32, WireValue::Varint(v)) => Value::from(zigzag_decode(v) as i32),
            (FieldKind::SInt64, WireValue::Varint(v)) => Value::from(zigzag_decode(v)),
            (FieldKind::Fixed32, WireValue::Fixed32(v)) => Value::from(v),
            (FieldKind::SFixed32, WireValue::Fixed32(v)) => Value::from(v as i32),
            (FieldKind::Fixed64, WireValue::Fixed64(v)) => Value::from(v),
            (FieldKind::SFixed64, WireValue::Fixed64(v)) => Value::from(v as i64),
            (FieldKind::Bool, WireValue::Varint(v)) => Value::Bool(v != 0),
            (FieldKind::Enum(e), WireValue::Varint(v)) => match e.name_of(v as i32) {
                Some(name) => Value::String(name.to_string()),
                None => Value::from(v as i32),
            },
            (FieldKind::String, WireValue::LengthDelimited(bytes)) => {
                let s = simdutf8::basic::from_utf8(bytes).map_err(|_| {
                    MapperError::conversion(format!("field `{}`: invalid UTF-8", desc.name))
                })?;
                Value::String(s.to_string())
            }
            (FieldKind::Bytes, WireValue::LengthDelimited(bytes)) => self.bytes_to_json(bytes),
            (FieldKind::Message(schema), WireValue::LengthDelimited(bytes)) => {
                Value::Object(self.decode_message(bytes, schema, depth + 1)?)
            }
            (kind, _) => {
                return Err(MapperError::conversion(format!(
                    "field `{}`: cannot decode {}",
                    desc.name,
                    kind.type_name()
                )));
            }
        };

        Ok(json)
    }

    fn default_value(&self, desc: &FieldDescriptor) -> Option<Value> {
        if !self.config.emit_default_values {
            return None;
        }
        let value = match desc.kind {
            FieldKind::Double | FieldKind::Float => float_to_json(0.0),
            FieldKind::Int32
            | FieldKind::Int64
            | FieldKind::UInt32
            | FieldKind::UInt64
            | FieldKind::SInt32
            | FieldKind::SInt64
            | FieldKind::Fixed32
            | FieldKind::Fixed64
            | FieldKind::SFixed32
            | FieldKind::SFixed64 => Value::from(0),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::String => Value::String(String::new()),
            FieldKind::Bytes => self.bytes_to_json(&[]),
            FieldKind::Enum(e) => match e.values.first() {
                Some((name, _)) => Value::String(name.to_string()),
                None => Value::from(0),
            },
            FieldKind::Message(_) => return None,
        };
        Some(value)
    }

    fn json_key(&self, desc: &FieldDescriptor) -> String {
        match self.config.field_naming {
            FieldNaming::Preserve => desc.name.to_string(),
            FieldNaming::LowerCamelCase => desc.json_name(),
        }
    }

    fn bytes_to_json(&self, bytes: &[u8]) -> Value {
        match self.config.bytes_encoding {
            BytesEncoding::Base64 => Value::String(BASE64_STANDARD.encode(bytes)),
            BytesEncoding::ByteArray => Value::from(bytes.to_vec()),
            #[cfg(feature = "stfu8")]
            BytesEncoding::Stfu8 => Value::String(stfu8::encode_u8(bytes)),
        }
    }

    fn encode_message(
        &self,
        value: &Value,
        schema: &MessageSchema,
        depth: usize,
        dst: &mut Vec<u8>,
    ) -> Result<()> {
        if depth > MAX_DEPTH {
            return Err(MapperError::conversion(format!(
                "message nesting exceeds {MAX_DEPTH} levels"
            )));
        }

        let Value::Object(map) = value else {
            return Err(MapperError::conversion(format!(
                "expected a JSON object for message {}, got {}",
                schema.name,
                json_type(value)
            )));
        };

        for (key, value) in map {
            let Some(desc) = schema.field_by_json_key(key) else {
                if self.config.ignore_unknown_fields {
                    trace!(schema = schema.name, key = %key, "ignoring unknown JSON key");
                    continue;
                }
                return Err(MapperError::conversion(format!(
                    "message {} has no field named `{key}`",
                    schema.name
                )));
            };

            if value.is_null() {
                continue;
            }

            if !desc.repeated {
                self.encode_field(desc, value, depth, dst)?;
                continue;
            }

            let Value::Array(items) = value else {
                return Err(MapperError::conversion(format!(
                    "field `{}` is repeated, expected a JSON array, got {}",
                    desc.name,
                    json_type(value)
                )));
            };

            if desc.kind.is_packable() {
                let mut packed = vec![];
                for item in items {
                    self.scalar_to_wire(desc, item)?.encode(&mut packed);
                }
                if !packed.is_empty() {
                    WireField {
                        number: desc.number,
                        value: WireValue::LengthDelimited(&packed),
                    }
                    .encode(dst);
                }
            } else {
                for item in items {
                    self.encode_field(desc, item, depth, dst)?;
                }
            }
        }

        Ok(())
    }

    fn encode_field(
        &self,
        desc: &FieldDescriptor,
        value: &Value,
        depth: usize,
        dst: &mut Vec<u8>,
    ) -> Result<()> {
        match desc.kind {
            FieldKind::String => {
                let s = value.as_str().ok_or_else(|| mismatch(desc, value))?;
                encode_key(desc.number, WireType::LengthDelimited, dst);
                WireValue::LengthDelimited(s.as_bytes()).encode(dst);
            }
            FieldKind::Bytes => {
                let bytes = self.bytes_from_json(desc, value)?;
                encode_key(desc.number, WireType::LengthDelimited, dst);
                WireValue::LengthDelimited(&bytes).encode(dst);
            }
            FieldKind::Message(schema) => {
                let mut nested = vec![];
                self.encode_message(value, schema, depth + 1, &mut nested)?;
                encode_key(desc.number, WireType::LengthDelimited, dst);
                WireValue::LengthDelimited(&nested).encode(dst);
            }
            _ => WireField {
                number: desc.number,
                value: self.scalar_to_wire(desc, value)?,
            }
            .encode(dst),
        }
        Ok(())
    }

    /// Convert a JSON scalar to the raw value of a packable field kind.
    fn scalar_to_wire(&self, desc: &FieldDescriptor, value: &Value) -> Result<WireValue<'static>> {
        let wire = match desc.kind {
            FieldKind::Double => WireValue::Fixed64(json_to_f64(desc, value)?.to_bits()),
            FieldKind::Float => {
                let v = json_to_f64(desc, value)?;
                if v.is_finite() && v.abs() > f32::MAX as f64 {
                    return Err(out_of_range(desc, value));
                }
                WireValue::Fixed32((v as f32).to_bits())
            }
            FieldKind::Int32 => WireValue::Varint(int32(desc, value)? as i64 as u64),
            FieldKind::Int64 => WireValue::Varint(json_to_i64(desc, value)? as u64),
            FieldKind::UInt32 => WireValue::Varint(uint32(desc, value)? as u64),
            FieldKind::UInt64 => WireValue::Varint(json_to_u64(desc, value)?),
            FieldKind::SInt32 => WireValue::Varint(zigzag_encode(int32(desc, value)? as i64)),
            FieldKind::SInt64 => WireValue::Varint(zigzag_encode(json_to_i64(desc, value)?)),
            FieldKind::Fixed32 => WireValue::Fixed32(uint32(desc, value)?),
            FieldKind::SFixed32 => WireValue::Fixed32(int32(desc, value)? as u32),
            FieldKind::Fixed64 => WireValue::Fixed64(json_to_u64(desc, value)?),
            FieldKind::SFixed64 => WireValue::Fixed64(json_to_i64(desc, value)? as u64),
            FieldKind::Bool => match value {
                Value::Bool(b) => WireValue::Varint(*b as u64),
                Value::String(s) if s == "true" => WireValue::Varint(1),
                Value::String(s) if s == "false" => WireValue::Varint(0),
                _ => return Err(mismatch(desc, value)),
            },
            FieldKind::Enum(e) => {
                let number = match value {
                    Value::String(name) => e.number_of(name).ok_or_else(|| {
                        MapperError::conversion(format!(
                            "field `{}`: unknown {} value `{name}`",
                            desc.name, e.name
                        ))
                    })?,
                    _ => int32(desc, value)?,
                };
                WireValue::Varint(number as i64 as u64)
            }
            FieldKind::String | FieldKind::Bytes | FieldKind::Message(_) => {
                return Err(mismatch(desc, value));
            }
        };
        Ok(wire)
    }

    fn bytes_from_json(&self, desc: &FieldDescriptor, value: &Value) -> Result<Vec<u8>> {
        let invalid = |reason: String| {
            MapperError::conversion(format!("field `{}`: invalid bytes: {reason}", desc.name))
        };
        match self.config.bytes_encoding {
            BytesEncoding::Base64 => {
                let s = value.as_str().ok_or_else(|| mismatch(desc, value))?;
                BASE64_STANDARD
                    .decode(s)
                    .or_else(|_| BASE64_URL_SAFE.decode(s))
                    .map_err(|e| invalid(e.to_string()))
            }
            BytesEncoding::ByteArray => {
                let items = value.as_array().ok_or_else(|| mismatch(desc, value))?;
                items
                    .iter()
                    .map(|item| {
                        item.as_u64()
                            .and_then(|b| u8::try_from(b).ok())
                            .ok_or_else(|| invalid(format!("{item} is not a byte")))
                    })
                    .collect()
            }
            #[cfg(feature = "stfu8")]
            BytesEncoding::Stfu8 => {
                let s = value.as_str().ok_or_else(|| mismatch(desc, value))?;
                stfu8::decode_u8(s).map_err(|e| invalid(format!("{e:?}")))
            }
        }
    }
}

/// Wire type a (non-packed) value of this kind is written with.
fn wire_type_of(kind: &FieldKind) -> WireType {
    match kind {
        FieldKind::Double | FieldKind::Fixed64 | FieldKind::SFixed64 => WireType::Fixed64,
        FieldKind::Float | FieldKind::Fixed32 | FieldKind::SFixed32 => WireType::Fixed32,
        FieldKind::String | FieldKind::Bytes | FieldKind::Message(_) => WireType::LengthDelimited,
        FieldKind::Int32
        | FieldKind::Int64
        | FieldKind::UInt32
        | FieldKind::UInt64
        | FieldKind::SInt32
        | FieldKind::SInt64
        | FieldKind::Bool
        | FieldKind::Enum(_) => WireType::Varint,
    }
}

/// Non-finite floats have no JSON number form and are written as strings.
fn float_to_json(v: f64) -> Value {
    if v.is_nan() {
        Value::String("NaN".to_string())
    } else if v.is_infinite() {
        let s = if v > 0.0 { "Infinity" } else { "-Infinity" };
        Value::String(s.to_string())
    } else {
        Number::from_f64(v).map_or(Value::Null, Value::Number)
    }
}

fn float32_to_json(v: f32) -> Value {
    // widen through the shortest decimal form so 0.1f32 prints as 0.1
    match v.to_string().parse::<f64>() {
        Ok(wide) => float_to_json(wide),
        Err(_) => float_to_json(v as f64),
    }
}

fn json_to_f64(desc: &FieldDescriptor, value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| mismatch(desc, value)),
        Value::String(s) => match s.as_str() {
            "NaN" => Ok(f64::NAN),
            "Infinity" => Ok(f64::INFINITY),
            "-Infinity" => Ok(f64::NEG_INFINITY),
            other => other.trim().parse().map_err(|_| mismatch(desc, value)),
        },
        _ => Err(mismatch(desc, value)),
    }
}

fn json_to_i64(desc: &FieldDescriptor, value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).and_then(f64_to_i64))
            .ok_or_else(|| out_of_range(desc, value)),
        Value::String(s) => s.trim().parse().map_err(|_| mismatch(desc, value)),
        _ => Err(mismatch(desc, value)),
    }
}

fn json_to_u64(desc: &FieldDescriptor, value: &Value) -> Result<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f < u64::MAX as f64)
                    .map(|f| f as u64)
            })
            .ok_or_else(|| out_of_range(desc, value)),
        Value::String(s) => s.trim().parse().map_err(|_| mismatch(desc, value)),
        _ => Err(mismatch(desc, value)),
    }
}

fn f64_to_i64(f: f64) -> Option<i64> {
    (f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

fn int32(desc: &FieldDescriptor, value: &Value) -> Result<i32> {
    i32::try_from(json_to_i64(desc, value)?).map_err(|_| out_of_range(desc, value))
}

fn uint32(desc: &FieldDescriptor, value: &Value) -> Result<u32> {
    u32::try_from(json_to_u64(desc, value)?).map_err(|_| out_of_range(desc, value))
}

fn mismatch(desc: &FieldDescriptor, value: &Value) -> MapperError {
    MapperError::conversion(format!(
        "field `{}`: expected {}, got {}",
        desc.name,
        desc.kind.type_name(),
        json_type(value)
    ))
}

fn out_of_range(desc: &FieldDescriptor, value: &Value) -> MapperError {
    MapperError::conversion(format!(
        "field `{}`: {value} is out of range for {}",
        desc.name,
        desc.kind.type_name()
    ))
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
