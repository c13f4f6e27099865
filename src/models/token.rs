//! Check-in token data models and API request/response types.
//!
//! This module defines:
//! - `TokenKind` / `TokenClass`: which family of token a record belongs to
//! - `TokenRecord`: the stored token entity and its consumption rules
//! - Request and response bodies for the token endpoints

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Stored discriminator separating token families that share one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Attendance,
    Registration,
}

impl TokenKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Attendance => "attendance",
            TokenKind::Registration => "registration",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A token family known at compile time.
///
/// Services are parameterized by a class, so an attendance validator can
/// only ever look up attendance records.
pub trait TokenClass: Send + Sync + 'static {
    const KIND: TokenKind;
}

/// Attendance check-in tokens shown as QR codes.
#[derive(Debug, Clone, Copy)]
pub struct Attendance;

impl TokenClass for Attendance {
    const KIND: TokenKind = TokenKind::Attendance;
}

/// Registration tokens handed out when enrolling a student's device.
#[derive(Debug, Clone, Copy)]
pub struct Registration;

impl TokenClass for Registration {
    const KIND: TokenKind = TokenKind::Registration;
}

/// Represents an issued token.
///
/// # Database Table
///
/// Maps to the `issued_tokens` table, keyed by `token`.
///
/// # Lifecycle
///
/// - `used` flips from false to true once, together with `used_at`
/// - expiry is never stored; it is computed from `expires_at` at read time
/// - records are never deleted here, cleanup happens outside the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub token: String,
    pub kind: TokenKind,
    pub student_uid: String,
    pub student_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

/// Lifecycle state derived from a record at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenState {
    Issued,
    Consumed,
    Expired,
}

/// Why a record cannot be consumed, in the order the checks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeRejection {
    Expired,
    StudentMismatch,
    AlreadyUsed,
}

impl TokenRecord {
    /// A fresh, unused record.
    pub fn issue(
        token: String,
        kind: TokenKind,
        student_uid: String,
        student_name: String,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            token,
            kind,
            student_uid,
            student_name,
            created_at: now,
            expires_at: now + ttl,
            used: false,
            used_at: None,
        }
    }

    /// Expired strictly after `expires_at`; a scan at exactly that instant still counts.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        if self.used {
            TokenState::Consumed
        } else if self.is_expired(now) {
            TokenState::Expired
        } else {
            TokenState::Issued
        }
    }

    /// Decide whether `claimed_uid` may consume this record at `now`.
    ///
    /// Expiry wins over every other outcome, then ownership, then use.
    pub fn check_consumable(
        &self,
        claimed_uid: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ConsumeRejection> {
        if self.is_expired(now) {
            return Err(ConsumeRejection::Expired);
        }
        if self.student_uid != claimed_uid {
            return Err(ConsumeRejection::StudentMismatch);
        }
        if self.used {
            return Err(ConsumeRejection::AlreadyUsed);
        }
        Ok(())
    }

    pub fn mark_used(&mut self, now: DateTime<Utc>) {
        self.used = true;
        self.used_at = Some(now);
    }
}

/// Request to issue a token for a student.
///
/// # JSON Example
///
/// ```json
/// {
///   "studentUid": "u1",
///   "studentName": "Alice"
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenRequest {
    pub student_uid: String,
    pub student_name: String,
}

/// Response for a successful issuance.
///
/// The token is what the client encodes into the QR image.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTokenResponse {
    pub success: bool,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Request to validate (consume) a scanned token.
///
/// # JSON Example
///
/// ```json
/// {
///   "token": "K7MPQ2XR9TWA",
///   "studentUid": "u1"
/// }
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenRequest {
    pub token: String,
    pub student_uid: String,
}

/// Response for a successful validation.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateTokenResponse {
    pub success: bool,
    pub student_uid: String,
    pub student_name: String,
}

/// Read-only view of a token for the student's QR screen.
///
/// Deliberately omits the student fields.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatusResponse {
    pub token: String,
    pub state: TokenState,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl TokenStatusResponse {
    pub fn from_record(record: TokenRecord, now: DateTime<Utc>) -> Self {
        Self {
            state: record.state(now),
            token: record.token,
            expires_at: record.expires_at,
            used_at: record.used_at,
        }
    }
}
