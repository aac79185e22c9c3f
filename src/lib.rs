//! # protobuf-object-mapper
//!
//! Maps between typed objects, protobuf messages and JSON text, and reads or writes JSON
//! documents through JSONPath expressions.
//!
//! ## Features
//! * Object ↔ message ↔ JSON conversions, fields matched by name
//! * Field order follows the message or struct declaration; lists keep their order
//! * Messages are built from a caller-supplied builder closure, no reflection involved
//! * JSONPath reads (`$.test.[*]`) and writes (`put`, `read_and_put`)
//! * Configurable key naming and bytes encoding (base64, byte array, stfu8)
//!
//! ## Limitations
//! * Map fields, `oneof` and well-known types are not supported by the schema tables.
//! * JSONPath filter expressions (`[?(...)]`) are not supported.
//!
//! ## Examples
//!
//! ``` rust
//! use protobuf_object_mapper::{FieldDescriptor, FieldKind, MessageSchema, ProtoMessage,
//!     ProtobufObjectMapper};
//! use serde::{Deserialize, Serialize};
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
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct TestObject {
//!     greeting: String,
//!     test: Vec<String>,
//! }
//!
//! let mapper = ProtobufObjectMapper::new();
//! let object = TestObject {
//!     greeting: "hello".to_string(),
//!     test: vec!["world".to_string()],
//! };
//!
//! let proto: Greeting = mapper.object_to_proto(&object, Greeting::default).unwrap();
//! let json = mapper.proto_to_json(&proto).unwrap();
//! assert_eq!(json, r#"{"greeting":"hello","test":["world"]}"#);
//!
//! let test: Vec<String> = mapper.read_field_from_json(&json, "$.test.[*]").unwrap();
//! assert_eq!(test, ["world"]);
//!
//! let json = mapper.read_and_put(&json, "$.test", "{}", "$", "testkey", |v| v).unwrap();
//! assert_eq!(json, r#"{"testkey":["world"]}"#);
//! ```
//!

mod config;
mod error;
mod mapper;
mod path;
mod schema;
mod transcode;
mod varint;
mod wire;

pub use config::{BytesEncoding, FieldNaming, MapperConfig};
pub use error::{MapperError, Result};
pub use mapper::ProtobufObjectMapper;
pub use path::JsonPath;
pub use schema::{EnumSchema, FieldDescriptor, FieldKind, MessageSchema, ProtoMessage};
pub use transcode::Transcoder;
pub use varint::{decode_var, encode_var};
pub use wire::{WireField, WireType, WireValue, read_fields};
