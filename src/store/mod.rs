//! Token storage backends.
//!
//! All backends implement [`TokenStore`]. The one correctness-critical
//! operation is [`TokenStore::consume`]: for a single token, the checks and
//! the `used` write must happen as one atomic step.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::token::{TokenKind, TokenRecord};

pub mod memory;
pub mod postgres;

pub use memory::MemoryTokenStore;
pub use postgres::PgTokenStore;

/// Durable key-value collection of issued tokens, keyed by token string.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Short backend name for health output and logs.
    fn backend(&self) -> &'static str;

    /// Verify the backend is reachable.
    async fn ping(&self) -> Result<(), AppError>;

    /// Persist a new record unless its token is already taken.
    ///
    /// # Returns
    /// * `Ok(true)` - record written
    /// * `Ok(false)` - a record with this token already exists; nothing written
    async fn insert_if_absent(&self, record: &TokenRecord) -> Result<bool, AppError>;

    /// Look up a record of the given kind. Records of other kinds are invisible.
    async fn find(&self, kind: TokenKind, token: &str) -> Result<Option<TokenRecord>, AppError>;

    /// Atomically check and consume a token.
    ///
    /// Runs the checks of [`TokenRecord::check_consumable`] and, only if they
    /// pass, marks the record used at `now`. Concurrent calls for the same
    /// token are serialized, so at most one of them succeeds. Failures leave
    /// the record untouched.
    ///
    /// Returns the record as it was after consumption.
    async fn consume(
        &self,
        kind: TokenKind,
        token: &str,
        claimed_uid: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenRecord, AppError>;
}
