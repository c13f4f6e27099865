//! In-memory token store.
//!
//! Used when no database is configured and throughout the test suite.
//! Per-token atomicity comes from holding the `DashMap` shard guard across
//! the check and the write; unrelated tokens mostly live in other shards.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use tracing::debug;

use crate::error::AppError;
use crate::models::token::{TokenKind, TokenRecord};
use crate::store::TokenStore;

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: DashMap<String, TokenRecord>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn insert_if_absent(&self, record: &TokenRecord) -> Result<bool, AppError> {
        match self.tokens.entry(record.token.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(true)
            }
        }
    }

    async fn find(&self, kind: TokenKind, token: &str) -> Result<Option<TokenRecord>, AppError> {
        Ok(self
            .tokens
            .get(token)
            .filter(|r| r.kind == kind)
            .map(|r| r.value().clone()))
    }

    async fn consume(
        &self,
        kind: TokenKind,
        token: &str,
        claimed_uid: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenRecord, AppError> {
        // The write guard is held until the end of this scope.
        let mut record = match self.tokens.get_mut(token) {
            Some(r) if r.kind == kind => r,
            _ => return Err(AppError::TokenNotFound),
        };

        record.check_consumable(claimed_uid, now)?;
        record.mark_used(now);
        debug!(kind = %kind, "token consumed in memory store");

        Ok(record.value().clone())
    }
}
