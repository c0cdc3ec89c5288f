//! Named site databases

use std::fmt;
use std::path::{Path, PathBuf};

use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use tracing::debug;

use crate::Result;

/// A named database owned by a site
///
/// Wraps an `sqlx` [`AnyPool`] so the same site can mix SQLite and server
/// databases. The optional migrations directory is consumed by the
/// migration fan-out.
#[derive(Clone)]
pub struct Database {
    name: String,
    pool: AnyPool,
    migrations_dir: Option<PathBuf>,
}

impl Database {
    /// Connect to `url` and name the resulting pool
    ///
    /// # Errors
    /// - `Error::Database` if the connection cannot be established
    pub async fn connect(
        name: impl Into<String>,
        url: &str,
        max_connections: u32,
    ) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let name = name.into();
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(url)
            .await?;

        debug!("Connected database {:?}", name);

        Ok(Self::from_pool(name, pool))
    }

    /// Wrap an already opened pool
    pub fn from_pool(name: impl Into<String>, pool: AnyPool) -> Self {
        Self {
            name: name.into(),
            pool,
            migrations_dir: None,
        }
    }

    /// Attach a directory of versioned `.sql` migrations
    pub fn with_migrations_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.migrations_dir = Some(dir.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn migrations_dir(&self) -> Option<&Path> {
        self.migrations_dir.as_deref()
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Close every connection of the pool
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("migrations_dir", &self.migrations_dir)
            .field("closed", &self.pool.is_closed())
            .finish()
    }
}
