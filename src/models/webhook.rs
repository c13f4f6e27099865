//! Webhook payloads for check-in notifications.
//!
//! # Webhook Flow
//!
//! 1. A scanner validates an attendance token
//! 2. The service signs a `attendance.checked_in` payload with the shared secret
//! 3. The external attendance recorder verifies the signature and records presence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Webhook payload sent to the attendance recorder.
///
/// # Example
///
/// ```json
/// {
///   "event_type": "attendance.checked_in",
///   "event_id": "550e8400-e29b-41d4-a716-446655440000",
///   "created_at": "2025-01-15T10:30:00Z",
///   "data": {
///     "check_in": {
///       "student_uid": "u1",
///       "student_name": "Alice",
///       "checked_in_at": "2025-01-15T10:30:00Z"
///     }
///   }
/// }
/// ```
///
/// # Signature Verification
///
/// The webhook includes an `X-Webhook-Signature` header with format:
/// `sha256=<hex_encoded_hmac>`
///
/// Receivers should verify this by computing HMAC-SHA256(secret, json_body)
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Type of event (always "attendance.checked_in")
    pub event_type: String,

    /// Unique identifier for this webhook event
    pub event_id: Uuid,

    /// When the event was created
    pub created_at: DateTime<Utc>,

    pub data: WebhookData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookData {
    pub check_in: CheckInWebhookData,
}

/// The consumed token's owner. The token string itself is not forwarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInWebhookData {
    pub student_uid: String,
    pub student_name: String,
    pub checked_in_at: DateTime<Utc>,
}

impl WebhookPayload {
    pub const CHECKED_IN: &'static str = "attendance.checked_in";

    /// Create a new webhook payload for a check-in event.
    ///
    /// The event is stamped with the check-in time, which comes from the application clock.
    pub fn checked_in(event_id: Uuid, check_in: CheckInWebhookData) -> Self {
        Self {
            event_type: Self::CHECKED_IN.to_string(),
            event_id,
            created_at: check_in.checked_in_at,
            data: WebhookData { check_in },
        }
    }
}
