//! Postgres-backed share repository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sharebin_core::{AppError, ShareItem};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::share::{ShareRepository, ShareSession};

#[derive(Clone)]
pub struct PgShareRepository {
    pool: PgPool,
}

impl PgShareRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

pub struct PgShareSession {
    tx: Transaction<'static, Postgres>,
}

fn map_insert_error(err: sqlx::Error, short_code: &str) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return AppError::CodeInUse(format!("Short code '{}' already in use", short_code));
        }
    }
    AppError::Database(err)
}

#[async_trait]
impl ShareRepository for PgShareRepository {
    async fn begin(&self) -> Result<Box<dyn ShareSession>, AppError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgShareSession { tx }))
    }

    #[tracing::instrument(skip(self), fields(db.table = "share_items", db.operation = "select"))]
    async fn get_by_code(&self, short_code: &str) -> Result<Option<ShareItem>, AppError> {
        let item = sqlx::query_as::<Postgres, ShareItem>(
            "SELECT * FROM share_items WHERE short_code = $1",
        )
        .bind(short_code)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    #[tracing::instrument(skip(self), fields(db.table = "share_items", db.operation = "update", user_id = %user_id))]
    async fn clear_owner(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE share_items SET user_id = NULL WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ShareSession for PgShareSession {
    #[tracing::instrument(skip(self, item), fields(db.table = "share_items", db.operation = "insert", short_code = %item.short_code))]
    async fn insert(&mut self, item: &ShareItem) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO share_items (id, user_id, short_code, kind, content, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.id)
        .bind(item.user_id)
        .bind(&item.short_code)
        .bind(item.kind)
        .bind(&item.content)
        .bind(item.expires_at)
        .bind(item.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_insert_error(e, &item.short_code))?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "share_items", db.operation = "select"))]
    async fn get_by_code(&mut self, short_code: &str) -> Result<Option<ShareItem>, AppError> {
        let item = sqlx::query_as::<Postgres, ShareItem>(
            "SELECT * FROM share_items WHERE short_code = $1",
        )
        .bind(short_code)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(item)
    }

    #[tracing::instrument(skip(self), fields(db.table = "share_items", db.operation = "delete", db.record_id = %id))]
    async fn delete_by_id(&mut self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM share_items WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "share_items", db.operation = "select"))]
    async fn find_expired(&mut self, now: DateTime<Utc>) -> Result<Vec<ShareItem>, AppError> {
        let items = sqlx::query_as::<Postgres, ShareItem>(
            "SELECT * FROM share_items WHERE expires_at < $1 ORDER BY expires_at",
        )
        .bind(now)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(items)
    }

    async fn commit(self: Box<Self>) -> Result<(), AppError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), AppError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
