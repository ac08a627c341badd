//! Core chat logic
//!
//! The reducer and the state transitions are pure and synchronous; the
//! session module owns the only suspending code, the chat socket.

mod chat;
mod reducer;
pub mod session;
mod state;

pub use chat::{AppEvent, ChatApp};
pub use reducer::{FenceDetection, Reducer, FENCE};
pub use session::{
    ClientFrame, ServerFrame, SessionEvent, SessionId, SessionMessage, SessionState,
    TransportFailure,
};
pub use state::{
    ActiveSession, ChatState, ModelStatus, Rejection, NOTICE_BUSY, NOTICE_DIRECTORY_FAILED,
    NOTICE_SELECT_MODEL, NOTICE_UNAVAILABLE,
};
