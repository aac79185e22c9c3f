//! Mapper configuration.

/// Options controlling how protobuf messages are rendered to and read from JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapperConfig {
    /// How JSON keys are derived from proto field names.
    pub field_naming: FieldNaming,

    /// How to encode bytes fields when converting to JSON.
    pub bytes_encoding: BytesEncoding,

    /// Print proto3 default values for fields absent from the message.
    pub emit_default_values: bool,

    /// Skip JSON keys that have no declared proto field instead of failing.
    pub ignore_unknown_fields: bool,

    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            field_naming: FieldNaming::default(),
            bytes_encoding: BytesEncoding::default(),
            emit_default_values: false,
            ignore_unknown_fields: true,
            pretty: false,
        }
    }
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_naming(mut self, field_naming: FieldNaming) -> Self {
        self.field_naming = field_naming;
        self
    }

    pub fn with_bytes_encoding(mut self, bytes_encoding: BytesEncoding) -> Self {
        self.bytes_encoding = bytes_encoding;
        self
    }

    pub fn with_default_values(mut self, emit: bool) -> Self {
        self.emit_default_values = emit;
        self
    }

    pub fn with_ignore_unknown_fields(mut self, ignore: bool) -> Self {
        self.ignore_unknown_fields = ignore;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

/// JSON key naming for proto fields.
///
/// Input accepts both forms regardless of this setting.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldNaming {
    #[default]
    /// Use the proto field name verbatim (`display_name`).
    Preserve,

    /// Use the lowerCamelCase `json_name` (`displayName`).
    LowerCamelCase,
}

/// How to encode bytes fields when converting to JSON.
///
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BytesEncoding {
    #[default]
    /// Encode bytes as a standard base64 string, as the proto3 JSON mapping does.
    Base64,

    /// Encode bytes as a JSON array of numbers.
    ByteArray,

    #[cfg(feature = "stfu8")]
    /// Encode bytes as [stfu8](https://crates.io/crates/stfu8) encoded string.
    Stfu8,
}
