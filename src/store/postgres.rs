//! PostgreSQL token store.
//!
//! # Atomicity Guarantees
//!
//! Consumption happens inside a PostgreSQL transaction. The token row is
//! locked with `FOR UPDATE` before it is inspected, so a second validator
//! for the same token blocks until the first commits or rolls back, and
//! then observes `used = true`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::token::{TokenKind, TokenRecord};
use crate::store::TokenStore;

/// Row shape of `issued_tokens`. The kind is fixed by the query filter.
#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    token: String,
    student_uid: String,
    student_name: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used: bool,
    used_at: Option<DateTime<Utc>>,
}

impl TokenRow {
    fn into_record(self, kind: TokenKind) -> TokenRecord {
        TokenRecord {
            token: self.token,
            kind,
            student_uid: self.student_uid,
            student_name: self.student_name,
            created_at: self.created_at,
            expires_at: self.expires_at,
            used: self.used,
            used_at: self.used_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PgTokenStore {
    pool: DbPool,
}

impl PgTokenStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_if_absent(&self, record: &TokenRecord) -> Result<bool, AppError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO issued_tokens (
                token,
                kind,
                student_uid,
                student_name,
                created_at,
                expires_at,
                used
            )
            VALUES ($1, $2, $3, $4, $5, $6, FALSE)
            ON CONFLICT (token) DO NOTHING
            "#,
        )
        .bind(&record.token)
        .bind(record.kind.as_str())
        .bind(&record.student_uid)
        .bind(&record.student_name)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(inserted == 1)
    }

    async fn find(&self, kind: TokenKind, token: &str) -> Result<Option<TokenRecord>, AppError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT token, student_uid, student_name, created_at, expires_at, used, used_at
            FROM issued_tokens
            WHERE token = $1 AND kind = $2
            "#,
        )
        .bind(token)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_record(kind)))
    }

    async fn consume(
        &self,
        kind: TokenKind,
        token: &str,
        claimed_uid: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenRecord, AppError> {
        let mut tx = self.pool.begin().await?;

        // Lock the token row; concurrent validators of this token wait here
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT token, student_uid, student_name, created_at, expires_at, used, used_at
            FROM issued_tokens
            WHERE token = $1 AND kind = $2
            FOR UPDATE
            "#,
        )
        .bind(token)
        .bind(kind.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(AppError::TokenNotFound);
        };
        let mut record = row.into_record(kind);

        if let Err(rejection) = record.check_consumable(claimed_uid, now) {
            tx.rollback().await?;
            return Err(rejection.into());
        }

        // The used = FALSE guard keeps the write conditional even under the row lock
        let updated = sqlx::query(
            r#"
            UPDATE issued_tokens
            SET used = TRUE,
                used_at = $1
            WHERE token = $2 AND kind = $3 AND used = FALSE
            "#,
        )
        .bind(now)
        .bind(token)
        .bind(kind.as_str())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 0 {
            tx.rollback().await?;
            return Err(AppError::TokenAlreadyUsed);
        }

        tx.commit().await?;
        debug!(kind = %kind, "token consumed in postgres store");

        record.mark_used(now);
        Ok(record)
    }
}
