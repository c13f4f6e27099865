//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, URL params)
//! 2. Delegates to a token service
//! 3. Returns HTTP response (JSON, status code)

/// Service health endpoint
pub mod health;
/// Check-in token endpoints
pub mod tokens;
