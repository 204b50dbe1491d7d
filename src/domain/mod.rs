//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;
pub mod source_name;

pub use entities::{
    ContractTerm, Digest, DissentFact, Document, DocumentKind, ExtractionRecord, MeetingRecord,
    Official, SpendingCategory, SpendingFact, SpendingRecord, VoteRecord,
};
pub use errors::{DomainError, GenerationError};
pub use source_name::{date_prefix, SourceName};
