//! Chat-turn orchestration for Parley.

mod chat;

pub use chat::{ChatReply, ChatService};
