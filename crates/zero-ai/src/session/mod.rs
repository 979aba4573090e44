//! Conversation sessions.
//!
//! Each session owns its history and backend binding behind an async mutex.
//! A turn holds that mutex from acceptance until it reaches a terminal
//! state, so at most one turn runs per session.

mod manager;
mod store;
mod types;

pub use manager::ConversationSession;
pub use store::SessionStore;
pub use types::{SessionHandle, TurnGuard};
