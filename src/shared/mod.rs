pub mod config;
pub mod prompts;
