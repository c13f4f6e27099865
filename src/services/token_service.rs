//! Token service - issuance and validation of check-in tokens.
//!
//! This service handles:
//! - Input validation before any store access
//! - Collision-safe issuance
//! - Single-use, time-bounded validation
//!
//! A `TokenService<C>` is bound to one token class, so an attendance
//! validator can never consume a registration token or the other way round.

use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::error::AppError;
use crate::models::token::{TokenClass, TokenRecord, TokenStatusResponse};
use crate::services::token_generator::{self, TokenGenerator};
use crate::store::TokenStore;

/// Fresh tokens drawn before issuance gives up on collisions.
pub const MAX_ISSUE_ATTEMPTS: usize = 5;

/// A token handed to the client for QR encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// The student a validated token belonged to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedInStudent {
    pub student_uid: String,
    pub student_name: String,
    pub checked_in_at: DateTime<Utc>,
}

pub struct TokenService<C: TokenClass> {
    store: Arc<dyn TokenStore>,
    clock: Arc<dyn Clock>,
    generator: Arc<dyn TokenGenerator>,
    ttl: Duration,
    _class: PhantomData<fn() -> C>,
}

impl<C: TokenClass> Clone for TokenService<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
            generator: Arc::clone(&self.generator),
            ttl: self.ttl,
            _class: PhantomData,
        }
    }
}

impl<C: TokenClass> TokenService<C> {
    pub fn new(
        store: Arc<dyn TokenStore>,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn TokenGenerator>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            generator,
            ttl,
            _class: PhantomData,
        }
    }

    /// Issue a new token for a student.
    ///
    /// # Process
    ///
    /// 1. Reject empty student fields
    /// 2. Draw a token and insert it only if no record holds that token yet
    /// 3. On collision draw again, up to [`MAX_ISSUE_ATTEMPTS`] times
    ///
    /// The token is only returned once its record has been written.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument`: student uid or name is empty
    /// - `StoreUnavailable`: the store could not be written
    /// - `TokenSpaceExhausted`: every candidate collided
    pub async fn issue(
        &self,
        student_uid: &str,
        student_name: &str,
    ) -> Result<IssuedToken, AppError> {
        // The uid is matched against trimmed claims; the name is stored as given
        let student_uid = student_uid.trim();

        if student_uid.is_empty() {
            return Err(AppError::InvalidArgument(
                "studentUid must not be empty".to_string(),
            ));
        }
        if student_name.trim().is_empty() {
            return Err(AppError::InvalidArgument(
                "studentName must not be empty".to_string(),
            ));
        }

        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let record = TokenRecord::issue(
                self.generator.generate(),
                C::KIND,
                student_uid.to_string(),
                student_name.to_string(),
                self.clock.now(),
                self.ttl,
            );

            if self.store.insert_if_absent(&record).await? {
                info!(
                    kind = %C::KIND,
                    student_uid,
                    token_prefix = record.token.get(..4).unwrap_or_default(),
                    expires_at = %record.expires_at,
                    "token issued"
                );
                return Ok(IssuedToken {
                    token: record.token,
                    expires_at: record.expires_at,
                });
            }

            warn!(kind = %C::KIND, attempt, "token collision, drawing again");
        }

        Err(AppError::TokenSpaceExhausted)
    }

    /// Validate and consume a presented token.
    ///
    /// # Checks (in order)
    ///
    /// 1. Token exists for this class, else `TokenNotFound`
    /// 2. Token has not expired, else `TokenExpired`
    /// 3. Token belongs to `claimed_uid`, else `StudentMismatch`
    /// 4. Token is unused, else `TokenAlreadyUsed`
    ///
    /// Checks and the `used` write run atomically in the store. Failures
    /// write nothing, and nothing is retried here.
    pub async fn validate(
        &self,
        presented_token: &str,
        claimed_uid: &str,
    ) -> Result<CheckedInStudent, AppError> {
        let token = Self::parse_token(presented_token)?;
        let claimed_uid = claimed_uid.trim();
        if claimed_uid.is_empty() {
            return Err(AppError::InvalidArgument(
                "studentUid must not be empty".to_string(),
            ));
        }

        let now = self.clock.now();
        let result = self.store.consume(C::KIND, &token, claimed_uid, now).await;

        match result {
            Ok(record) => {
                info!(kind = %C::KIND, student_uid = %record.student_uid, "token validated");
                Ok(CheckedInStudent {
                    student_uid: record.student_uid,
                    student_name: record.student_name,
                    checked_in_at: now,
                })
            }
            Err(e) => {
                if !matches!(e, AppError::StoreUnavailable(_)) {
                    info!(kind = %C::KIND, claimed_uid, outcome = e.code(), "token rejected");
                }
                Err(e)
            }
        }
    }

    /// Current lifecycle state of a token. Never writes.
    pub async fn status(&self, presented_token: &str) -> Result<TokenStatusResponse, AppError> {
        let token = Self::parse_token(presented_token)?;
        let record = self
            .store
            .find(C::KIND, &token)
            .await?
            .ok_or(AppError::TokenNotFound)?;

        Ok(TokenStatusResponse::from_record(record, self.clock.now()))
    }

    fn parse_token(presented: &str) -> Result<String, AppError> {
        let token = token_generator::normalize(presented);
        if token.is_empty() {
            return Err(AppError::InvalidArgument(
                "token must not be empty".to_string(),
            ));
        }
        if !token_generator::is_well_formed(&token) {
            return Err(AppError::InvalidArgument("malformed token".to_string()));
        }
        Ok(token)
    }
}
