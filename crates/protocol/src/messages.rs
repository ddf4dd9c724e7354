//! Operation and result envelopes exchanged with a file manager backend.
//!
//! Requests arrive as loosely-typed JSON objects keyed by `operation`. They
//! are validated exactly once, here, into one of the typed request structs;
//! a missing or unusable field becomes a single [`ProtocolError`] instead of
//! surfacing later inside a handler.
//!
//! Numeric chunk fields (`dzchunkindex`, `dzchunkbyteoffset`, ...) are
//! accepted both as JSON numbers and as decimal strings, because browser
//! upload widgets post them stringified.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{ProtocolError, Result};

/// Operation name for chunk uploads.
pub const OP_UPLOAD: &str = "upload";
/// Operation name for chunk downloads.
pub const OP_DOWNLOAD: &str = "download";
/// Operation name for flat directory listings.
pub const OP_LIST: &str = "list";
/// Operation name for directory creation.
pub const OP_MAKE_DIR: &str = "make_dir";
/// Operation name for file deletion.
pub const OP_DELETE: &str = "delete";

// ============================================================================
// Requests
// ============================================================================

/// A validated operation envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Write one chunk of a file.
    Upload(UploadChunk),
    /// Read one window of a file.
    Download(DownloadRequest),
    /// Enumerate one directory level.
    List(ListRequest),
    /// Create one directory.
    MakeDir(MakeDirRequest),
    /// Remove one file.
    Delete(DeleteRequest),
}

/// One chunk of an upload. `path + filename` names the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadChunk {
    /// Directory containing the target.
    pub path: String,
    /// Target file name.
    pub filename: String,
    /// Opaque client session id (`dzuuid`). Not interpreted by the backend.
    pub uuid: Option<String>,
    /// Zero-based chunk index.
    pub chunk_index: u64,
    /// Client's nominal chunk size (`dzchunksize`), informational.
    pub chunk_size: Option<u64>,
    /// Total number of chunks in this upload.
    pub total_chunk_count: u64,
    /// Byte offset at which `content` is written.
    pub chunk_byte_offset: u64,
    /// Declared total size. Always present on the final chunk.
    pub total_file_size: Option<u64>,
    /// Decoded chunk bytes.
    pub content: Vec<u8>,
}

impl UploadChunk {
    /// Whether this is the last chunk of the upload.
    pub fn is_final(&self) -> bool {
        self.chunk_index + 1 == self.total_chunk_count
    }
}

/// Where a download continues from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    /// Index returned by the previous call.
    pub chunk_index: u64,
    /// `dzchunkbyteoffset` returned by the previous call.
    pub byte_offset: u64,
}

/// Request for one download window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Directory containing the file.
    pub path: String,
    /// File name.
    pub filename: String,
    /// `None` on the first call.
    pub continuation: Option<Continuation>,
}

/// Flat listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    /// Directory to enumerate.
    pub path: String,
}

/// Directory creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeDirRequest {
    /// Parent directory.
    pub path: String,
    /// Name of the directory to create.
    pub name: String,
}

/// File removal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    /// Directory containing the file.
    pub path: String,
    /// Name of the file to remove.
    pub name: String,
}

impl Operation {
    /// Validate a raw JSON envelope.
    pub fn from_value(value: &Value) -> Result<Self> {
        let raw = RawEnvelope::deserialize(value)?;
        let operation = required("operation", raw.operation.clone())?;

        match operation.as_str() {
            OP_UPLOAD => raw.into_upload().map(Operation::Upload),
            OP_DOWNLOAD => raw.into_download().map(Operation::Download),
            OP_LIST => Ok(Operation::List(ListRequest {
                path: required("path", raw.path)?,
            })),
            OP_MAKE_DIR => Ok(Operation::MakeDir(MakeDirRequest {
                path: required("path", raw.path)?,
                name: required("name", raw.name)?,
            })),
            OP_DELETE => Ok(Operation::Delete(DeleteRequest {
                path: required("path", raw.path)?,
                name: required("name", raw.name)?,
            })),
            other => Err(ProtocolError::UnsupportedOperation(other.to_string())),
        }
    }

    /// Parse and validate a JSON envelope from text.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// The wire name of this operation.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Upload(_) => OP_UPLOAD,
            Operation::Download(_) => OP_DOWNLOAD,
            Operation::List(_) => OP_LIST,
            Operation::MakeDir(_) => OP_MAKE_DIR,
            Operation::Delete(_) => OP_DELETE,
        }
    }

    /// Encode back into the wire envelope.
    pub fn to_value(&self) -> Value {
        match self {
            Operation::Upload(chunk) => {
                let mut chunk_data = json!({
                    "dzchunkindex": chunk.chunk_index,
                    "dztotalchunkcount": chunk.total_chunk_count,
                    "dzchunkbyteoffset": chunk.chunk_byte_offset,
                    "filename": chunk.filename,
                    "content": BASE64.encode(&chunk.content),
                });
                if let Some(uuid) = &chunk.uuid {
                    chunk_data["dzuuid"] = json!(uuid);
                }
                if let Some(size) = chunk.chunk_size {
                    chunk_data["dzchunksize"] = json!(size);
                }
                if let Some(total) = chunk.total_file_size {
                    chunk_data["dztotalfilesize"] = json!(total);
                }
                json!({ "operation": OP_UPLOAD, "path": chunk.path, "chunk_data": chunk_data })
            }
            Operation::Download(req) => {
                let mut value = json!({
                    "operation": OP_DOWNLOAD,
                    "path": req.path,
                    "filename": req.filename,
                });
                if let Some(cont) = req.continuation {
                    value["chunk_data"] = json!({
                        "dzchunkindex": cont.chunk_index,
                        "dzchunkbyteoffset": cont.byte_offset,
                    });
                }
                value
            }
            Operation::List(req) => json!({ "operation": OP_LIST, "path": req.path }),
            Operation::MakeDir(req) => {
                json!({ "operation": OP_MAKE_DIR, "path": req.path, "name": req.name })
            }
            Operation::Delete(req) => {
                json!({ "operation": OP_DELETE, "path": req.path, "name": req.name })
            }
        }
    }
}

/// Envelope as it arrives, before any field is required.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    operation: Option<String>,
    path: Option<String>,
    filename: Option<String>,
    name: Option<String>,
    chunk_data: Option<RawChunkData>,
}

/// `chunk_data` of an upload chunk or a download continuation.
#[derive(Debug, Deserialize)]
struct RawChunkData {
    dzuuid: Option<String>,
    dzchunkindex: Option<NumberOrString>,
    dzchunksize: Option<NumberOrString>,
    dztotalchunkcount: Option<NumberOrString>,
    dzchunkbyteoffset: Option<NumberOrString>,
    dztotalfilesize: Option<NumberOrString>,
    filename: Option<String>,
    content: Option<String>,
}

/// Numeric field posted either as a JSON number or stringified.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(serde_json::Number),
    Text(String),
}

impl NumberOrString {
    fn into_u64(self, field: &str) -> Result<u64> {
        let parsed = match &self {
            NumberOrString::Number(n) => n.as_u64(),
            NumberOrString::Text(s) => s.trim().parse().ok(),
        };
        parsed.ok_or_else(|| ProtocolError::invalid(field, "must be a non-negative integer"))
    }
}

impl RawEnvelope {
    fn into_upload(self) -> Result<UploadChunk> {
        let path = required("path", self.path)?;
        let data = required("chunk_data", self.chunk_data)?;

        let chunk_index = required_u64("chunk_data.dzchunkindex", data.dzchunkindex)?;
        let total_chunk_count = required_u64("chunk_data.dztotalchunkcount", data.dztotalchunkcount)?;
        let chunk_byte_offset = required_u64("chunk_data.dzchunkbyteoffset", data.dzchunkbyteoffset)?;
        let filename = required("chunk_data.filename", data.filename)?;
        let encoded = required("chunk_data.content", data.content)?;
        let chunk_size = optional_u64("chunk_data.dzchunksize", data.dzchunksize)?;
        let total_file_size = optional_u64("chunk_data.dztotalfilesize", data.dztotalfilesize)?;

        if total_chunk_count == 0 {
            return Err(ProtocolError::invalid(
                "chunk_data.dztotalchunkcount",
                "must be at least 1",
            ));
        }
        if chunk_index >= total_chunk_count {
            return Err(ProtocolError::invalid(
                "chunk_data.dzchunkindex",
                format!("{} is not below dztotalchunkcount {}", chunk_index, total_chunk_count),
            ));
        }

        // Only the final chunk carries an authoritative total size.
        if chunk_index + 1 == total_chunk_count && total_file_size.is_none() {
            return Err(ProtocolError::MissingField(
                "chunk_data.dztotalfilesize".to_string(),
            ));
        }

        let content = BASE64
            .decode(encoded.as_bytes())
            .map_err(|e| ProtocolError::invalid("chunk_data.content", e.to_string()))?;

        Ok(UploadChunk {
            path,
            filename,
            uuid: data.dzuuid,
            chunk_index,
            chunk_size,
            total_chunk_count,
            chunk_byte_offset,
            total_file_size,
            content,
        })
    }

    fn into_download(self) -> Result<DownloadRequest> {
        let path = required("path", self.path)?;
        let filename = required("filename", self.filename)?;

        let continuation = match self.chunk_data {
            None => None,
            Some(data) => {
                let index = optional_u64("chunk_data.dzchunkindex", data.dzchunkindex)?;
                let offset = optional_u64("chunk_data.dzchunkbyteoffset", data.dzchunkbyteoffset)?;
                match (index, offset) {
                    (Some(chunk_index), Some(byte_offset)) => Some(Continuation {
                        chunk_index,
                        byte_offset,
                    }),
                    (None, None) => None,
                    (Some(_), None) => {
                        return Err(ProtocolError::MissingField(
                            "chunk_data.dzchunkbyteoffset".to_string(),
                        ))
                    }
                    (None, Some(_)) => {
                        return Err(ProtocolError::MissingField(
                            "chunk_data.dzchunkindex".to_string(),
                        ))
                    }
                }
            }
        };

        Ok(DownloadRequest {
            path,
            filename,
            continuation,
        })
    }
}

fn required<T>(field: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| ProtocolError::MissingField(field.to_string()))
}

fn optional_u64(field: &str, value: Option<NumberOrString>) -> Result<Option<u64>> {
    value.map(|v| v.into_u64(field)).transpose()
}

fn required_u64(field: &str, value: Option<NumberOrString>) -> Result<u64> {
    required(field, optional_u64(field, value)?)
}

// ============================================================================
// Replies
// ============================================================================

/// Application-level status carried in every result envelope.
///
/// Independent of any transport status: a successful invocation may still
/// carry a `500` here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u16);

impl StatusCode {
    /// Request succeeded.
    pub const OK: StatusCode = StatusCode(200);
    /// Client error: validation failure or conflict.
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    /// Backend failure: I/O or integrity.
    pub const INTERNAL_ERROR: StatusCode = StatusCode(500);

    /// Whether this is a 2xx status.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Plain `{statusCode, message}` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    /// Application status.
    #[serde(rename = "statusCode")]
    pub status_code: StatusCode,
    /// Stable human-readable message.
    pub message: String,
}

impl StatusReply {
    /// Build a reply from a status and message.
    pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

/// One download window plus the bookkeeping for the next call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadReply {
    /// Always `200`.
    #[serde(rename = "statusCode")]
    pub status_code: StatusCode,
    /// Stable message.
    pub message: String,
    /// Index of this window.
    #[serde(rename = "dzchunkindex")]
    pub chunk_index: u64,
    /// `ceil(file_size / chunk_size)` at the time of this call.
    #[serde(rename = "dztotalchunkcount")]
    pub total_chunk_count: u64,
    /// Offset to request next.
    #[serde(rename = "dzchunkbyteoffset")]
    pub next_byte_offset: u64,
    /// Base64 encoded window contents.
    pub chunk_data: String,
    /// Size of the file at the time of this call.
    #[serde(rename = "dztotalfilesize")]
    pub total_file_size: u64,
}

impl DownloadReply {
    /// Whether the client has received every window.
    pub fn is_done(&self) -> bool {
        self.chunk_index >= self.total_chunk_count
    }

    /// Decode `chunk_data`.
    pub fn data(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(self.chunk_data.as_bytes())
            .map_err(|e| ProtocolError::invalid("chunk_data", e.to_string()))
    }

    /// The continuation to send with the next request.
    pub fn continuation(&self) -> Continuation {
        Continuation {
            chunk_index: self.chunk_index,
            byte_offset: self.next_byte_offset,
        }
    }
}

/// Encode raw bytes the way `chunk_data` expects.
pub fn encode_chunk(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// One level of a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListReply {
    /// Always `200`.
    #[serde(rename = "statusCode")]
    pub status_code: StatusCode,
    /// Stable message.
    pub message: String,
    /// The listed path, as requested.
    pub path: String,
    /// Subdirectory names, sorted.
    pub directories: Vec<String>,
    /// File names, sorted.
    pub files: Vec<String>,
}

/// Any result envelope a backend can return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    /// A download window.
    Download(DownloadReply),
    /// A directory listing.
    Listing(ListReply),
    /// Status only.
    Status(StatusReply),
}

impl Reply {
    /// Application status of this reply.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Reply::Download(r) => r.status_code,
            Reply::Listing(r) => r.status_code,
            Reply::Status(r) => r.status_code,
        }
    }

    /// Message of this reply.
    pub fn message(&self) -> &str {
        match self {
            Reply::Download(r) => &r.message,
            Reply::Listing(r) => &r.message,
            Reply::Status(r) => &r.message,
        }
    }

    /// Serialize to a JSON value.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Parse a JSON value produced by [`Reply::to_value`].
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

impl From<ProtocolError> for Reply {
    fn from(err: ProtocolError) -> Self {
        Reply::Status(StatusReply::new(StatusCode::BAD_REQUEST, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload_event(chunk_data: Value) -> Value {
        json!({ "operation": "upload", "path": "/mnt/efs", "chunk_data": chunk_data })
    }

    #[test]
    fn test_missing_operation() {
        let err = Operation::from_value(&json!({ "path": "/" })).unwrap_err();
        assert_eq!(err, ProtocolError::MissingField("operation".to_string()));
    }

    #[test]
    fn test_unsupported_operation() {
        let err = Operation::from_value(&json!({ "operation": "rename" })).unwrap_err();
        assert_eq!(err, ProtocolError::UnsupportedOperation("rename".to_string()));
    }

    #[test]
    fn test_non_object_envelope() {
        let err = Operation::from_value(&json!(["upload"])).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_upload_with_stringified_numbers() {
        let event = upload_event(json!({
            "dzuuid": "10f726ea-ae1d-4363-9a97-4bf6772cd4df",
            "dzchunkindex": "0",
            "dzchunksize": "4",
            "dztotalchunkcount": "1",
            "dzchunkbyteoffset": "0",
            "dztotalfilesize": "4",
            "filename": "test.txt",
            "content": "dGVzdA==",
        }));

        let Operation::Upload(chunk) = Operation::from_value(&event).unwrap() else {
            panic!("expected upload");
        };
        assert_eq!(chunk.path, "/mnt/efs");
        assert_eq!(chunk.filename, "test.txt");
        assert_eq!(chunk.content, b"test");
        assert_eq!(chunk.chunk_size, Some(4));
        assert_eq!(chunk.total_file_size, Some(4));
        assert!(chunk.is_final());
    }

    #[test]
    fn test_upload_final_chunk_requires_total_size() {
        let event = upload_event(json!({
            "dzchunkindex": 1,
            "dztotalchunkcount": 2,
            "dzchunkbyteoffset": 4,
            "filename": "test.txt",
            "content": "dGVzdA==",
        }));
        let err = Operation::from_value(&event).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::MissingField("chunk_data.dztotalfilesize".to_string())
        );
    }

    #[test]
    fn test_upload_intermediate_chunk_without_total_size() {
        let event = upload_event(json!({
            "dzchunkindex": 0,
            "dztotalchunkcount": 2,
            "dzchunkbyteoffset": 0,
            "filename": "test.txt",
            "content": "dGVzdA==",
        }));
        let Operation::Upload(chunk) = Operation::from_value(&event).unwrap() else {
            panic!("expected upload");
        };
        assert!(!chunk.is_final());
        assert_eq!(chunk.total_file_size, None);
    }

    #[test]
    fn test_upload_intermediate_chunk_rejects_bad_total_size() {
        let event = upload_event(json!({
            "dzchunkindex": 0,
            "dztotalchunkcount": 2,
            "dzchunkbyteoffset": 0,
            "dztotalfilesize": "lots",
            "filename": "test.txt",
            "content": "dGVzdA==",
        }));
        let err = Operation::from_value(&event).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField { ref field, .. } if field == "chunk_data.dztotalfilesize"));
    }

    #[test]
    fn test_upload_rejects_bad_chunk_size() {
        let event = upload_event(json!({
            "dzchunkindex": 0,
            "dzchunksize": "-1",
            "dztotalchunkcount": 2,
            "dzchunkbyteoffset": 0,
            "filename": "test.txt",
            "content": "dGVzdA==",
        }));
        let err = Operation::from_value(&event).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField { ref field, .. } if field == "chunk_data.dzchunksize"));
    }

    #[test]
    fn test_non_numeric_field_type_is_malformed() {
        let event = upload_event(json!({
            "dzchunkindex": true,
            "dztotalchunkcount": 2,
            "dzchunkbyteoffset": 0,
            "filename": "test.txt",
            "content": "",
        }));
        let err = Operation::from_value(&event).unwrap_err();
        assert!(matches!(err, ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_upload_index_out_of_range() {
        let event = upload_event(json!({
            "dzchunkindex": 3,
            "dztotalchunkcount": 2,
            "dzchunkbyteoffset": 0,
            "filename": "test.txt",
            "content": "",
        }));
        let err = Operation::from_value(&event).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField { ref field, .. } if field == "chunk_data.dzchunkindex"));
    }

    #[test]
    fn test_upload_bad_base64() {
        let event = upload_event(json!({
            "dzchunkindex": 0,
            "dztotalchunkcount": 2,
            "dzchunkbyteoffset": 0,
            "filename": "test.txt",
            "content": "***",
        }));
        let err = Operation::from_value(&event).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField { ref field, .. } if field == "chunk_data.content"));
    }

    #[test]
    fn test_upload_missing_chunk_data() {
        let err = Operation::from_value(&json!({ "operation": "upload", "path": "/" })).unwrap_err();
        assert_eq!(err, ProtocolError::MissingField("chunk_data".to_string()));
    }

    #[test]
    fn test_negative_offset_rejected() {
        let event = upload_event(json!({
            "dzchunkindex": 0,
            "dztotalchunkcount": 2,
            "dzchunkbyteoffset": -5,
            "filename": "test.txt",
            "content": "",
        }));
        let err = Operation::from_value(&event).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField { .. }));
    }

    #[test]
    fn test_download_first_call() {
        let op = Operation::from_json(r#"{"operation":"download","path":"./","filename":"a.bin"}"#)
            .unwrap();
        assert_eq!(
            op,
            Operation::Download(DownloadRequest {
                path: "./".to_string(),
                filename: "a.bin".to_string(),
                continuation: None,
            })
        );
    }

    #[test]
    fn test_download_continuation() {
        let op = Operation::from_value(&json!({
            "operation": "download",
            "path": "/",
            "filename": "a.bin",
            "chunk_data": { "dzchunkindex": "2", "dzchunkbyteoffset": 6000000 },
        }))
        .unwrap();
        let Operation::Download(req) = op else {
            panic!("expected download");
        };
        assert_eq!(
            req.continuation,
            Some(Continuation {
                chunk_index: 2,
                byte_offset: 6_000_000
            })
        );
    }

    #[test]
    fn test_download_half_continuation_rejected() {
        let err = Operation::from_value(&json!({
            "operation": "download",
            "path": "/",
            "filename": "a.bin",
            "chunk_data": { "dzchunkindex": 1 },
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::MissingField("chunk_data.dzchunkbyteoffset".to_string())
        );
    }

    #[test]
    fn test_make_dir_requires_name() {
        let err = Operation::from_value(&json!({ "operation": "make_dir", "path": "/" })).unwrap_err();
        assert_eq!(err, ProtocolError::MissingField("name".to_string()));
    }

    #[test]
    fn test_upload_to_value_decodes_back() {
        let chunk = UploadChunk {
            path: "/docs".to_string(),
            filename: "r.pdf".to_string(),
            uuid: Some("abc".to_string()),
            chunk_index: 1,
            chunk_size: Some(3),
            total_chunk_count: 2,
            chunk_byte_offset: 3,
            total_file_size: Some(6),
            content: b"def".to_vec(),
        };
        let op = Operation::Upload(chunk);
        assert_eq!(Operation::from_value(&op.to_value()).unwrap(), op);
    }

    #[test]
    fn test_status_reply_wire_shape() {
        let reply = Reply::Status(StatusReply::new(StatusCode::BAD_REQUEST, "File already exists"));
        let value = reply.to_value().unwrap();
        assert_eq!(value, json!({ "statusCode": 400, "message": "File already exists" }));
    }

    #[test]
    fn test_download_reply_parses_as_download() {
        let value = json!({
            "statusCode": 200,
            "message": "chunk read",
            "dzchunkindex": 0,
            "dztotalchunkcount": 1,
            "dzchunkbyteoffset": 2000000,
            "chunk_data": "aGk=",
            "dztotalfilesize": 2,
        });
        let Reply::Download(reply) = Reply::from_value(value).unwrap() else {
            panic!("expected download reply");
        };
        assert_eq!(reply.data().unwrap(), b"hi");
        assert!(!reply.is_done());
        assert_eq!(reply.continuation().byte_offset, 2_000_000);
    }

    #[test]
    fn test_listing_reply_parses_as_listing() {
        let value = json!({
            "statusCode": 200,
            "message": "listing complete",
            "path": "/",
            "directories": ["a"],
            "files": ["b.txt"],
        });
        assert!(matches!(Reply::from_value(value).unwrap(), Reply::Listing(_)));
    }

    #[test]
    fn test_protocol_error_becomes_bad_request() {
        let reply: Reply = ProtocolError::MissingField("path".to_string()).into();
        assert_eq!(reply.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(reply.message(), "missing required parameter: path");
    }
}
