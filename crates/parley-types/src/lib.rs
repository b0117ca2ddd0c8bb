//! Shared types and error hierarchy for Parley.

pub mod answer;
pub mod error;
pub mod message;

pub use answer::{AnswerFuture, AnswerGenerator, AnswerRequest};
pub use error::{ApiError, ConfigError, ParleyError};
pub use message::*;
