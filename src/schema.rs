//! Static message schemas.
//!
//! A schema is the explicit binding between protobuf field numbers and JSON keys. It is
//! written once per message type, next to the `prost` struct:
//!
//! ``` rust
//! use protobuf_object_mapper::{FieldDescriptor, FieldKind, MessageSchema, ProtoMessage};
//!
//! #[derive(Clone, PartialEq, prost::Message)]
//! pub struct Greeting {
//!     #[prost(string, tag = "1")]
//!     pub greeting: String,
//!     #[prost(string, repeated, tag = "2")]
//!     pub test: Vec<String>,
//! }
//!
//! static GREETING: MessageSchema = MessageSchema::new(
//!     "Greeting",
//!     &[
//!         FieldDescriptor::singular("greeting", 1, FieldKind::String),
//!         FieldDescriptor::repeated("test", 2, FieldKind::String),
//!     ],
//! );
//!
//! impl ProtoMessage for Greeting {
//!     fn schema() -> &'static MessageSchema {
//!         &GREETING
//!     }
//! }
//! ```

use std::fmt;

/// A protobuf message whose fields can be mapped by name.
pub trait ProtoMessage: prost::Message + Default {
    /// Field table of this message, in declaration order.
    fn schema() -> &'static MessageSchema;
}

/// Field table of one message type.
#[derive(Debug, Clone, Copy)]
pub struct MessageSchema {
    /// Message name, only used in error messages.
    pub name: &'static str,

    /// Fields in declaration order. JSON output follows this order.
    pub fields: &'static [FieldDescriptor],
}

impl MessageSchema {
    pub const fn new(name: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        Self { name, fields }
    }

    pub fn field_by_number(&self, number: u32) -> Option<(usize, &FieldDescriptor)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.number == number)
    }

    /// Look a JSON key up, accepting both the proto name and its lowerCamelCase form.
    pub fn field_by_json_key(&self, key: &str) -> Option<&FieldDescriptor> {
        self.fields
            .iter()
            .find(|f| f.name == key)
            .or_else(|| self.fields.iter().find(|f| f.json_name() == key))
    }
}

/// One declared field.
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    /// Proto field name, case-sensitive.
    pub name: &'static str,

    /// Tag number.
    pub number: u32,

    pub kind: FieldKind,

    pub repeated: bool,
}

impl FieldDescriptor {
    pub const fn singular(name: &'static str, number: u32, kind: FieldKind) -> Self {
        Self {
            name,
            number,
            kind,
            repeated: false,
        }
    }

    pub const fn repeated(name: &'static str, number: u32, kind: FieldKind) -> Self {
        Self {
            name,
            number,
            kind,
            repeated: true,
        }
    }

    /// lowerCamelCase name, computed the way protoc derives `json_name`.
    pub fn json_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut upper_next = false;
        for c in self.name.chars() {
            if c == '_' {
                upper_next = true;
            } else if upper_next {
                out.push(c.to_ascii_uppercase());
                upper_next = false;
            } else {
                out.push(c);
            }
        }
        out
    }
}

/// Declared type of a field.
#[derive(Clone, Copy)]
pub enum FieldKind {
    Double,
    Float,
    Int32,
    Int64,
    UInt32,
    UInt64,
    SInt32,
    SInt64,
    Fixed32,
    Fixed64,
    SFixed32,
    SFixed64,
    Bool,
    String,
    Bytes,
    Enum(&'static EnumSchema),
    Message(&'static MessageSchema),
}

impl FieldKind {
    /// Whether repeated values of this kind are packed into one length-delimited record.
    pub fn is_packable(&self) -> bool {
        !matches!(
            self,
            FieldKind::String | FieldKind::Bytes | FieldKind::Message(_)
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Double => "double",
            FieldKind::Float => "float",
            FieldKind::Int32 => "int32",
            FieldKind::Int64 => "int64",
            FieldKind::UInt32 => "uint32",
            FieldKind::UInt64 => "uint64",
            FieldKind::SInt32 => "sint32",
            FieldKind::SInt64 => "sint64",
            FieldKind::Fixed32 => "fixed32",
            FieldKind::Fixed64 => "fixed64",
            FieldKind::SFixed32 => "sfixed32",
            FieldKind::SFixed64 => "sfixed64",
            FieldKind::Bool => "bool",
            FieldKind::String => "string",
            FieldKind::Bytes => "bytes",
            FieldKind::Enum(e) => e.name,
            FieldKind::Message(m) => m.name,
        }
    }
}

// Schemas may be recursive, so only print the referenced type's name.
impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Enum(e) => write!(f, "Enum({})", e.name),
            FieldKind::Message(m) => write!(f, "Message({})", m.name),
            other => f.write_str(other.type_name()),
        }
    }
}

/// Named values of an enum type.
#[derive(Debug, Clone, Copy)]
pub struct EnumSchema {
    pub name: &'static str,

    /// `(name, number)` pairs; the first entry is the default value.
    pub values: &'static [(&'static str, i32)],
}

impl EnumSchema {
    pub const fn new(name: &'static str, values: &'static [(&'static str, i32)]) -> Self {
        Self { name, values }
    }

    pub fn name_of(&self, number: i32) -> Option<&'static str> {
        self.values
            .iter()
            .find(|(_, n)| *n == number)
            .map(|(name, _)| *name)
    }

    pub fn number_of(&self, name: &str) -> Option<i32> {
        self.values
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, number)| *number)
    }
}
