//! deskchat - terminal chat client for a local AI model runtime
//!
//! Talks to a backend that fronts the runtime: models and saved
//! conversations come over HTTP, replies stream over one WebSocket
//! connection per message. Streamed fragments are folded into the turn
//! list by [`crate::core::Reducer`], which keeps code fences well formed.

pub mod backend;
pub mod config;
pub mod conversation;
pub mod core;
pub mod render;

pub use crate::backend::{Backend, BackendError, HttpBackend};
pub use crate::config::Config;
pub use crate::conversation::{Conversation, NewConversation, Role, Turn};
pub use crate::core::{AppEvent, ChatApp, ChatState, ModelStatus};
