use thiserror::Error;

pub type Result<T> = std::result::Result<T, MapperError>;

/// Errors returned by the mapper.
///
/// Every operation either returns a complete result or one of these; nothing is
/// partially written.
#[derive(Debug, Error)]
pub enum MapperError {
    /// Input JSON text is not well-formed.
    #[error("invalid json: {0}")]
    Parse(#[source] serde_json::Error),

    /// A value has no compatible representation on the other side.
    #[error("conversion error: {0}")]
    Conversion(String),

    /// A value cannot be rendered into the target format.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A JSONPath expression matched nothing, or matched something that can't be written to.
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// A JSONPath expression could not be parsed.
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },
}

impl MapperError {
    pub(crate) fn conversion(msg: impl Into<String>) -> Self {
        MapperError::Conversion(msg.into())
    }

    pub(crate) fn invalid_path(path: &str, reason: impl Into<String>) -> Self {
        MapperError::InvalidPath {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<prost::DecodeError> for MapperError {
    fn from(err: prost::DecodeError) -> Self {
        MapperError::Conversion(err.to_string())
    }
}
