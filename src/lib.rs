pub mod app;
pub mod backend;
pub mod config;
pub mod error;
pub mod handler;
pub mod reply;
pub mod session;
pub mod tui;
pub mod ui;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use backend::{ChatTransport, HttpTransport, RawResponse};
pub use config::Config;
pub use error::TransportError;
pub use session::{ChatMessage, ChatRole, RequestId, Session, SessionEvent, Status};
