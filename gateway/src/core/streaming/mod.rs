//! Live transcription session lifecycle.

mod session;

pub use session::{StreamState, TranscriptionSession};
