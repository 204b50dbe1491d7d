//! Persistence adapters: document loading, extraction cache, SQLite store.

pub mod extract_cache;
pub mod fs_docs;
pub mod sqlite_store;

pub use extract_cache::JsonExtractCache;
pub use fs_docs::FsDocumentStore;
pub use sqlite_store::{DisabledStore, SqliteStore};
