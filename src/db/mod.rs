mod boards;
mod mills;
mod partners;
mod sessions;
mod users;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppError;
use crate::live::{Snapshot, SnapshotSource};

/// Database connection wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Turn a unique violation on `constraint` into a Conflict, pass anything else through
fn on_unique(e: sqlx::Error, constraint: &str, message: impl FnOnce() -> String) -> AppError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.constraint() == Some(constraint) {
            return AppError::Conflict(message());
        }
    }
    AppError::Store(e)
}

#[async_trait]
impl SnapshotSource for Database {
    async fn load_snapshot(&self) -> anyhow::Result<Snapshot> {
        // One consistent read across the four tables
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let boards = boards::fetch_all(&mut tx).await?;
        let mills = mills::fetch_all(&mut tx).await?;
        let partners = partners::fetch_all(&mut tx).await?;
        let users = users::fetch_all(&mut tx).await?;
        tx.commit().await?;

        Ok(Snapshot {
            boards,
            mills,
            partners,
            users,
        })
    }
}
