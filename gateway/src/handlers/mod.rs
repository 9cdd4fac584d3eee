//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `calls` - Outbound call placement
//! - `socket` - Conversation WebSocket transport
//! - `telephony` - Telephony webhook bridge

pub mod api;
pub mod calls;
mod session;
pub mod socket;
pub mod telephony;

pub use socket::socket_handler;
