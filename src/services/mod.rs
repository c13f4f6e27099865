//! Business logic services.
//!
//! Services contain the token protocol separated from HTTP handlers.

pub mod token_generator;
pub mod token_service;
pub mod webhook_service;
