//! HTTP client primitives for the chat streaming backend.
//!
//! This crate owns request building, response classification and wire-record
//! decoding for the `/api/chat` and `/api/recover/{token}` endpoints. It
//! implements the `chat_transport` contract and carries no session policy:
//! stall detection, recovery and rendering live with the caller.
//!
//! Wire format: newline-delimited `data:<payload>` records. Payloads with a
//! reserved prefix are control signals, see [`StreamRecord::classify`].

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod sse;
pub mod url;

pub use client::{ChatApiClient, HttpChunkReader};
pub use config::ChatApiConfig;
pub use error::ChatApiError;
pub use events::{SignalKind, StreamRecord, END_OF_STREAM};
pub use payload::ChatPayload;
pub use sse::RecordDecoder;
pub use crate::url::{chat_url, recover_url, DEFAULT_BASE_URL};
