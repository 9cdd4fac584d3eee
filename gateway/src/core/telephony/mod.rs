//! Telephony provider integration: voice-response markup, webhook signature
//! verification, and outbound call placement.

mod client;
pub mod markup;
pub mod signature;

pub use client::{DEFAULT_TELEPHONY_API_BASE, OutboundCall, PlacedCall, RestTelephonyClient, TelephonyProvider};
pub use markup::{Gather, VoiceResponse};
pub use signature::{compute_signature, verify_signature};
