mod error;
mod kv;
mod schema;
mod store;

pub use error::TranscriptStoreError;
pub use kv::{FileStore, KeyValueStore, MemoryStore};
pub use schema::{StoredLine, StoredSegment, StoredSource, StructuralKind, StructuralSegment};
pub use store::{TranscriptStore, HISTORY_KEY, THREAD_ID_KEY};
