//! # SFM Protocol Library
//!
//! Wire types shared by the SFM manager backend, its transfer gateway and
//! clients.
//!
//! ## Overview
//!
//! - **Operation envelopes**: `upload`, `download`, `list`, `make_dir` and
//!   `delete` requests, validated once at the boundary
//! - **Result envelopes**: every reply carries an application-level
//!   `statusCode` and `message`, independent of the transport
//! - **Rule records**: security group rules and mount targets in the shape
//!   the network API returns them
//!
//! The chunked transfer protocol is stateless on the backend side: every
//! upload chunk re-asserts its byte offset and totals, and every download
//! reply tells the client where to continue.
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{Operation, Reply, StatusCode, StatusReply};
//!
//! let op = Operation::from_json(
//!     r#"{"operation": "download", "path": "/", "filename": "report.pdf"}"#,
//! ).unwrap();
//! assert_eq!(op.name(), "download");
//!
//! let reply = Reply::Status(StatusReply::new(StatusCode::OK, "chunk accepted"));
//! assert!(reply.status_code().is_success());
//! ```
//!
//! ## Modules
//!
//! - [`messages`]: operation and result envelopes
//! - [`rules`]: security group rules and mount targets
//! - [`error`]: error types

pub mod error;
pub mod messages;
pub mod rules;

pub use error::{ProtocolError, Result};
pub use messages::{
    encode_chunk, Continuation, DeleteRequest, DownloadReply, DownloadRequest, ListReply,
    ListRequest, MakeDirRequest, Operation, Reply, StatusCode, StatusReply, UploadChunk,
};
pub use rules::{MountTarget, ReferencedGroupInfo, SecurityGroupRule, ALL_PORTS};
