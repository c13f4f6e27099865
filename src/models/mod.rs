//! Data models representing stored entities and API bodies.

/// Check-in token model
pub mod token;
/// Check-in webhook payloads
pub mod webhook;
