//! Application services. Orchestrate ports; no infrastructure details.

pub mod consolidation_service;
pub mod extraction_service;
pub mod gateway;
pub mod history;

pub use consolidation_service::ConsolidationService;
pub use extraction_service::{ExtractionBatch, ExtractionOptions, ExtractionService};
pub use gateway::{GatewayStep, LlmGateway};
pub use history::HistoryBuilder;
