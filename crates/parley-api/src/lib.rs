//! Chat-completions client and answer generator for Parley.

mod client;
mod prompt;
mod provider;
mod retry;

pub use client::ApiClient;
pub use prompt::{DEFAULT_SYSTEM_PROMPT, build_system_message};
pub use provider::CompletionsAnswerer;
pub use retry::RetryConfig;
