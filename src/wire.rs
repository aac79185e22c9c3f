//! Protobuf wire format: field keys and raw values.

use crate::error::{MapperError, Result};
use crate::varint::{decode_var, encode_var};

/// Largest field number protobuf allows.
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;

/// Raw protocol buffer field as it appears on the wire.
#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub struct WireField<'a> {
    /// Field number.
    pub number: u32,

    /// Undecoded value.
    pub value: WireValue<'a>,
}

/// Raw protocol buffer value.
///
/// The wire type only tells how large a value is; what it means depends on the field kind
/// declared in the schema.
#[derive(Debug, PartialEq, Clone, Eq, Hash)]
pub enum WireValue<'a> {
    /// Varint (wire type = 0).
    Varint(u64),

    /// 64-bit value (wire type = 1).
    Fixed64(u64),

    /// Length-delimited value (wire type = 2).
    LengthDelimited(&'a [u8]),

    /// 32-bit value (wire type = 5).
    Fixed32(u32),
}

impl<'a> WireValue<'a> {
    /// Decode a value of the given wire type from the front of `data`.
    pub fn decode(data: &mut &'a [u8], wire_type: WireType) -> Result<Self> {
        match wire_type {
            WireType::Varint => decode_var(data)
                .map(WireValue::Varint)
                .ok_or_else(|| truncated("varint")),
            WireType::Fixed64 => {
                let bytes = take(data, 8).ok_or_else(|| truncated("fixed64"))?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(bytes);
                Ok(WireValue::Fixed64(u64::from_le_bytes(arr)))
            }
            WireType::LengthDelimited => {
                let len = decode_var(data).ok_or_else(|| truncated("length prefix"))?;
                let len = usize::try_from(len).map_err(|_| truncated("length-delimited"))?;
                take(data, len)
                    .map(WireValue::LengthDelimited)
                    .ok_or_else(|| truncated("length-delimited"))
            }
            WireType::Fixed32 => {
                let bytes = take(data, 4).ok_or_else(|| truncated("fixed32"))?;
                let mut arr = [0u8; 4];
                arr.copy_from_slice(bytes);
                Ok(WireValue::Fixed32(u32::from_le_bytes(arr)))
            }
            WireType::Invalid(wt) => Err(MapperError::conversion(format!(
                "unsupported wire type {wt}"
            ))),
        }
    }

    pub fn wire_type(&self) -> WireType {
        match self {
            WireValue::Varint(_) => WireType::Varint,
            WireValue::Fixed64(_) => WireType::Fixed64,
            WireValue::LengthDelimited(_) => WireType::LengthDelimited,
            WireValue::Fixed32(_) => WireType::Fixed32,
        }
    }

    /// Append this value, without its key, to `dst`.
    pub fn encode(&self, dst: &mut Vec<u8>) {
        match *self {
            WireValue::Varint(v) => encode_var(v, dst),
            WireValue::Fixed64(v) => dst.extend_from_slice(&v.to_le_bytes()),
            WireValue::LengthDelimited(bytes) => {
                encode_var(bytes.len() as u64, dst);
                dst.extend_from_slice(bytes);
            }
            WireValue::Fixed32(v) => dst.extend_from_slice(&v.to_le_bytes()),
        }
    }
}

impl WireField<'_> {
    /// Append key and value to `dst`.
    pub fn encode(&self, dst: &mut Vec<u8>) {
        encode_key(self.number, self.value.wire_type(), dst);
        self.value.encode(dst);
    }
}

/// Append a field key (number and wire type) to `dst`.
pub fn encode_key(number: u32, wire_type: WireType, dst: &mut Vec<u8>) {
    encode_var(((number as u64) << 3) | wire_type.as_u8() as u64, dst);
}

/// Split a message into its raw fields, in wire order.
///
/// Unlike a best-effort scan, any truncated value or bad key fails the whole message.
pub fn read_fields(mut data: &[u8]) -> Result<Vec<WireField<'_>>> {
    let mut fields = vec![];
    let data = &mut data;

    while !data.is_empty() {
        let key = decode_var(data).ok_or_else(|| truncated("field key"))?;
        let number = u32::try_from(key >> 3)
            .ok()
            .filter(|n| (1..=MAX_FIELD_NUMBER).contains(n))
            .ok_or_else(|| MapperError::conversion(format!("invalid field number {}", key >> 3)))?;
        let wire_type = WireType::from((key & 0x07) as u8);

        let value = WireValue::decode(data, wire_type)?;
        fields.push(WireField { number, value });
    }

    Ok(fields)
}

fn take<'a>(data: &mut &'a [u8], len: usize) -> Option<&'a [u8]> {
    if data.len() < len {
        return None;
    }
    let (head, rest) = data.split_at(len);
    *data = rest;
    Some(head)
}

fn truncated(what: &str) -> MapperError {
    MapperError::conversion(format!("truncated {what} in protobuf data"))
}

/// Low three bits of a field key, telling how the value that follows is framed.
#[derive(Debug, PartialEq, Clone, Eq, Copy, Hash)]
pub enum WireType {
    /// Varint-framed ints, bools and enums.
    Varint,

    /// Eight little-endian bytes: double, fixed64, sfixed64.
    Fixed64,

    /// Length prefix then payload: strings, bytes, messages, packed runs.
    LengthDelimited,

    /// Four little-endian bytes: float, fixed32, sfixed32.
    Fixed32,

    /// Deprecated groups (3, 4) or an unassigned value; never decoded.
    Invalid(u8),
}

impl WireType {
    pub fn as_u8(self) -> u8 {
        match self {
            WireType::Varint => 0,
            WireType::Fixed64 => 1,
            WireType::LengthDelimited => 2,
            WireType::Fixed32 => 5,
            WireType::Invalid(other) => other,
        }
    }
}

impl From<u8> for WireType {
    fn from(value: u8) -> Self {
        match value {
            0 => WireType::Varint,
            1 => WireType::Fixed64,
            2 => WireType::LengthDelimited,
            5 => WireType::Fixed32,
            other => WireType::Invalid(other),
        }
    }
}
