// Library interface for paperdigest modules
// This allows tests and the binary to import modules

pub mod cache;
pub mod documents;
pub mod error;
pub mod llm;
pub mod processing;
pub mod progress;
pub mod prompts;
pub mod qa;
pub mod review;
pub mod source;
pub mod template;
