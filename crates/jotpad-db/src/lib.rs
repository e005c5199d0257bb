//! # jotpad-db
//!
//! PostgreSQL persistence and filesystem attachment storage for jotpad.
//!
//! `Database` bundles the connection pool with the note repository; the
//! attachment side lives in [`attachments::FilesystemStore`], which is wired
//! up separately because it has no database dependency.

pub mod attachments;
pub mod notes;
pub mod pool;

pub use attachments::FilesystemStore;
pub use notes::PgNoteRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};

use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use jotpad_core::Result;

/// Aggregates the connection pool and repository implementations.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    pub notes: Arc<PgNoteRepository>,
}

impl Database {
    /// Build a `Database` from an existing pool.
    pub fn new(pool: PgPool) -> Self {
        let notes = Arc::new(PgNoteRepository::new(pool.clone()));
        Self { pool, notes }
    }

    /// Connect with default pool configuration.
    pub async fn connect(database_url: &str) -> Result<Self> {
        Ok(Self::new(create_pool(database_url).await?))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        Ok(Self::new(create_pool_with_config(database_url, config).await?))
    }

    /// Run pending migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| jotpad_core::Error::Database(e.into()))?;
        info!(
            subsystem = "database",
            component = "migrations",
            op = "applied",
            "Database migrations applied"
        );
        Ok(())
    }

    /// Access the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
