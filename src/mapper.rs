//! The mapper façade.

use std::any::type_name;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::error::Category;

use crate::config::MapperConfig;
use crate::error::{MapperError, Result};
use crate::path::JsonPath;
use crate::schema::{MessageSchema, ProtoMessage};
use crate::transcode::{Transcoder, json_type};

/// Converts between typed objects, protobuf messages and JSON text, and reads or writes JSON
/// documents through JSONPath expressions.
///
/// The mapper holds only its configuration. Every call parses its inputs afresh and returns a
/// new value, so one mapper can be shared freely between threads.
#[derive(Debug, Default, Clone)]
pub struct ProtobufObjectMapper {
    config: MapperConfig,
}

impl ProtobufObjectMapper {
    /// Create a mapper with the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mapper with the given configuration.
    pub fn with_config(config: MapperConfig) -> Self {
        Self { config }
    }

    /// Configuration this mapper was built with.
    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    /// Copy the fields of `object` into a message produced by `builder`.
    ///
    /// Object fields without a proto field of the same name are skipped. Decoded values are
    /// merged into the builder's message, so pre-set scalars are overwritten and pre-filled
    /// repeated fields are appended to.
    pub fn object_to_proto<T, M, F>(&self, object: &T, builder: F) -> Result<M>
    where
        T: Serialize + ?Sized,
        M: ProtoMessage,
        F: FnOnce() -> M,
    {
        let value = serde_json::to_value(object).map_err(|e| {
            MapperError::conversion(format!("cannot read {}: {e}", type_name::<T>()))
        })?;
        let config = MapperConfig {
            ignore_unknown_fields: true,
            ..self.config.clone()
        };
        merge_into(&config, &value, builder)
    }

    /// Build a `T` from the fields of `message`.
    ///
    /// Fields the message leaves at their default are passed to `T` as proto3 defaults, so an
    /// empty string or list survives the trip.
    pub fn proto_to_object<M, T>(&self, message: &M) -> Result<T>
    where
        M: ProtoMessage,
        T: DeserializeOwned,
    {
        let config = MapperConfig {
            emit_default_values: true,
            ..self.config.clone()
        };
        let value = message_to_value(&config, message)?;
        serde_json::from_value(value).map_err(|e| {
            MapperError::conversion(format!(
                "cannot build {} from {}: {e}",
                type_name::<T>(),
                M::schema().name
            ))
        })
    }

    /// Render `message` as JSON text, keys in field declaration order.
    pub fn proto_to_json<M: ProtoMessage>(&self, message: &M) -> Result<String> {
        let value = message_to_value(&self.config, message).map_err(|e| match e {
            MapperError::Conversion(msg) => MapperError::Serialization(msg),
            other => other,
        })?;
        self.render(&value)
    }

    /// Parse JSON text into a message produced by `builder`.
    pub fn json_to_proto<M, F>(&self, json: &str, builder: F) -> Result<M>
    where
        M: ProtoMessage,
        F: FnOnce() -> M,
    {
        let value = parse_json(json)?;
        merge_into(&self.config, &value, builder)
    }

    /// Parse JSON text into a `T`.
    pub fn json_to_object<T: DeserializeOwned>(&self, json: &str) -> Result<T> {
        serde_json::from_str(json).map_err(|e| match e.classify() {
            Category::Data => MapperError::conversion(format!(
                "cannot build {}: {e}",
                type_name::<T>()
            )),
            _ => MapperError::Parse(e),
        })
    }

    /// Render `object` as JSON text, keys in field declaration order.
    pub fn object_to_json<T: Serialize + ?Sized>(&self, object: &T) -> Result<String> {
        let value = to_json_value(object)?;
        self.render(&value)
    }

    /// Read the value at `path` in `json` as a `T`.
    ///
    /// A path with wildcards, deep scans, unions or slices reads as a JSON array of every
    /// match, so `$.test.[*]` and `$.test` both decode as a `Vec<String>` here.
    pub fn read_field_from_json<T: DeserializeOwned>(&self, json: &str, path: &str) -> Result<T> {
        let document = parse_json(json)?;
        let path = JsonPath::parse(path)?;
        let value = path.read(&document)?;
        serde_json::from_value(value).map_err(|e| {
            MapperError::conversion(format!(
                "value at `{path}` is not a {}: {e}",
                type_name::<T>()
            ))
        })
    }

    /// Return `json` with `key` set to `value` on the object(s) at `base_path`.
    pub fn put_value_in_json<V: Serialize + ?Sized>(
        &self,
        json: &str,
        base_path: &str,
        key: &str,
        value: &V,
    ) -> Result<String> {
        let mut document = parse_json(json)?;
        let path = JsonPath::parse(base_path)?;
        path.put(&mut document, key, to_json_value(value)?)?;
        self.render(&document)
    }

    /// Read `read_path` from `source`, pass the value through `transform`, and set the result
    /// as `key` on the object(s) at `write_path` in `target`.
    ///
    /// Content already in `target` is kept; an existing `key` is overwritten.
    pub fn read_and_put<F, V>(
        &self,
        source: &str,
        read_path: &str,
        target: &str,
        write_path: &str,
        key: &str,
        transform: F,
    ) -> Result<String>
    where
        F: FnOnce(Value) -> V,
        V: Serialize,
    {
        let source = parse_json(source)?;
        let mut target = parse_json(target)?;
        let read_path = JsonPath::parse(read_path)?;
        let write_path = JsonPath::parse(write_path)?;

        let value = to_json_value(&transform(read_path.read(&source)?))?;
        write_path.put(&mut target, key, value)?;
        self.render(&target)
    }

    /// Decode raw protobuf bytes described by `schema` into JSON text.
    pub fn wire_to_json(&self, data: &[u8], schema: &MessageSchema) -> Result<String> {
        let map = Transcoder::new(&self.config).decode(data, schema)?;
        self.render(&Value::Object(map))
    }

    /// Encode JSON text into raw protobuf bytes described by `schema`.
    pub fn json_to_wire(&self, json: &str, schema: &MessageSchema) -> Result<Vec<u8>> {
        let value = parse_json(json)?;
        Transcoder::new(&self.config).encode(&value, schema)
    }

    fn render(&self, value: &Value) -> Result<String> {
        let text = if self.config.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        text.map_err(|e| MapperError::Serialization(e.to_string()))
    }
}

fn parse_json(json: &str) -> Result<Value> {
    serde_json::from_str(json).map_err(MapperError::Parse)
}

fn to_json_value<T: Serialize + ?Sized>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| {
        MapperError::Serialization(format!("cannot render {}: {e}", type_name::<T>()))
    })
}

fn message_to_value<M: ProtoMessage>(config: &MapperConfig, message: &M) -> Result<Value> {
    let bytes = message.encode_to_vec();
    Transcoder::new(config)
        .decode(&bytes, M::schema())
        .map(Value::Object)
}

fn merge_into<M, F>(config: &MapperConfig, value: &Value, builder: F) -> Result<M>
where
    M: ProtoMessage,
    F: FnOnce() -> M,
{
    if !value.is_object() {
        return Err(MapperError::conversion(format!(
            "{} needs a JSON object, got {}",
            M::schema().name,
            json_type(value)
        )));
    }
    let bytes = Transcoder::new(config).encode(value, M::schema())?;
    let mut message = builder();
    message.merge(bytes.as_slice())?;
    Ok(message)
}
