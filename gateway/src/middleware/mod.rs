pub mod connection_limit;
pub mod telephony_signature;

// Re-export middleware functions
pub use connection_limit::{ClientIp, connection_limit_middleware};
pub use telephony_signature::telephony_signature_middleware;
