//! Board Watch: turns a week of local-government meeting artifacts into a
//! resident-facing newsletter plus durable vote and spending records.
//!
//! Hexagonal layout: `domain` holds pure entities, `ports` the async trait
//! seams, `usecases` the two pipeline phases, `adapters` the LLM providers
//! and storage, `shared` the configuration and prompt text.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
