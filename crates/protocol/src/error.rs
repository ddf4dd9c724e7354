//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering envelope decoding and encoding failures.
///
/// Every variant is a client-side mistake and maps to an application-level
/// `400` when surfaced in a result envelope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A required field is absent from the envelope.
    #[error("missing required parameter: {0}")]
    MissingField(String),

    /// A field is present but its value is unusable.
    #[error("invalid parameter {field}: {reason}")]
    InvalidField {
        /// Dotted path of the offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The `operation` key names something this backend does not serve.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// The payload is not a JSON object of the expected shape.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// Failed to serialize a reply.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ProtocolError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_eof() || err.is_syntax() {
            ProtocolError::Malformed(err.to_string())
        } else {
            ProtocolError::Serialization(err.to_string())
        }
    }
}
