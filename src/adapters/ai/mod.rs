//! AI adapter module. Implements `GenerationPort` for LLM providers.
//!
//! Also hosts the structured-log parser, since the fenced log format is
//! part of the model-output contract.

pub mod anthropic;
pub mod logparse;
pub mod mock;
pub mod openai;

pub use anthropic::AnthropicAdapter;
pub use logparse::{parse_spending, parse_votes};
pub use mock::MockGenerationAdapter;
pub use openai::OpenAiAdapter;
