//! Port traits. API boundaries for the hexagon.
//!
//! Outbound only: the pipeline is driven by `main` rather than an
//! interactive inbound adapter.

pub mod outbound;

pub use outbound::{DocumentStore, ExtractCachePort, GenerationPort, PersistencePort};
