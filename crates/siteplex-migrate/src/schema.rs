//! Versioned schema migrations
//!
//! Applied migrations are tracked in a `schema_migrations` table so every
//! migration runs exactly once and in version order. Migrations come from a
//! static list or from a directory of `NNNN_description.sql` files.

use std::borrow::Cow;
use std::path::Path;

use async_trait::async_trait;
use sqlx::{Any, AnyPool};
use tracing::{debug, info};

use crate::error::{MigrateError, Result};
use crate::events::{Event, EventHandler};
use crate::strategy::Migrator;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version BIGINT PRIMARY KEY,
        description TEXT NOT NULL,
        applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
    )
"#;

const APPLIED_VERSIONS: &str = "SELECT version FROM schema_migrations";

/// Version insert with the bind markers of `backend`
///
/// MySQL only understands `?`; PostgreSQL only `$N`; SQLite takes both.
fn record_version_sql(backend: &str) -> &'static str {
    if backend.eq_ignore_ascii_case("mysql") {
        "INSERT INTO schema_migrations (version, description) VALUES (?, ?)"
    } else {
        "INSERT INTO schema_migrations (version, description) VALUES ($1, $2)"
    }
}

/// A single schema migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    pub version: i64,
    pub description: Cow<'static, str>,
    pub up_sql: Cow<'static, str>,
}

impl Migration {
    pub const fn new(version: i64, description: &'static str, up_sql: &'static str) -> Self {
        Self {
            version,
            description: Cow::Borrowed(description),
            up_sql: Cow::Borrowed(up_sql),
        }
    }
}

enum Source {
    Static(Vec<Migration>),
    DatabaseDir,
}

/// Event handler applying pending migrations through the event's migrator
pub struct SchemaMigrations {
    source: Source,
}

impl SchemaMigrations {
    /// Use the same migrations for every database
    ///
    /// # Errors
    /// - `MigrateError::InvalidMigrations` for duplicate versions
    pub fn new(mut migrations: Vec<Migration>) -> Result<Self> {
        sort_and_check(&mut migrations)?;
        Ok(Self {
            source: Source::Static(migrations),
        })
    }

    /// Read each database's own migrations directory
    pub fn from_database_dirs() -> Self {
        Self {
            source: Source::DatabaseDir,
        }
    }

    /// Load `NNNN_description.sql` files from `dir`, sorted by version
    ///
    /// Files that do not end in `.sql` are ignored.
    pub fn load_dir(dir: &Path) -> Result<Vec<Migration>> {
        let mut migrations = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("sql") {
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            let (version, description) = parse_file_stem(stem).ok_or_else(|| {
                MigrateError::InvalidMigrationFile {
                    path: path.clone(),
                    reason: "expected NNNN_description.sql".to_string(),
                }
            })?;
            let up_sql = std::fs::read_to_string(&path)?;
            migrations.push(Migration {
                version,
                description: Cow::Owned(description),
                up_sql: Cow::Owned(up_sql),
            });
        }
        sort_and_check(&mut migrations)?;
        Ok(migrations)
    }

    /// Apply pending migrations, returning how many ran
    pub async fn apply(migrator: &mut Migrator, migrations: &[Migration]) -> Result<usize> {
        migrator.execute(CREATE_TABLE).await?;

        let applied = migrator.applied_versions().await?;

        debug!(
            "{:?}: {} applied migration(s): {:?}",
            migrator.database(),
            applied.len(),
            applied
        );

        let mut count = 0;
        for migration in migrations {
            if applied.contains(&migration.version) {
                continue;
            }

            info!(
                "{:?}: applying migration {}: {}",
                migrator.database(),
                migration.version,
                migration.description
            );

            migrator.execute_script(&migration.up_sql).await?;

            migrator
                .record_version(migration.version, migration.description.to_string())
                .await?;

            count += 1;
        }
        Ok(count)
    }

    /// Highest applied version, `None` before the first migration
    pub async fn current_version(pool: &AnyPool) -> Result<Option<i64>> {
        sqlx::query(CREATE_TABLE).execute(pool).await?;
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_migrations")
            .fetch_one(pool)
            .await?;
        Ok(version)
    }
}

impl Migrator {
    async fn applied_versions(&mut self) -> Result<Vec<i64>> {
        let versions = sqlx::query_scalar::<Any, i64>(APPLIED_VERSIONS)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(versions)
    }

    async fn record_version(&mut self, version: i64, description: String) -> Result<()> {
        let sql = record_version_sql(self.backend_name());
        self.log_statement(sql);
        sqlx::query::<Any>(sql)
            .bind(version)
            .bind(description)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl EventHandler for SchemaMigrations {
    async fn handle(&self, event: &mut Event<'_>) -> Result<()> {
        let loaded;
        let migrations: &[Migration] = match &self.source {
            Source::Static(migrations) => migrations,
            Source::DatabaseDir => {
                let Some(dir) = event.database().and_then(|db| db.migrations_dir()) else {
                    debug!("{}: no migrations directory", event.name());
                    return Ok(());
                };
                loaded = SchemaMigrations::load_dir(dir)?;
                &loaded
            }
        };

        let migrator = event.migrator()?;
        SchemaMigrations::apply(migrator, migrations).await?;
        Ok(())
    }
}

fn parse_file_stem(stem: &str) -> Option<(i64, String)> {
    let (version, description) = stem.split_once('_')?;
    let version = version.parse().ok()?;
    Some((version, description.replace('_', " ")))
}

fn sort_and_check(migrations: &mut [Migration]) -> Result<()> {
    migrations.sort_by_key(|m| m.version);
    for pair in migrations.windows(2) {
        if pair[0].version == pair[1].version {
            return Err(MigrateError::InvalidMigrations(format!(
                "version {} is defined twice",
                pair[0].version
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Direct, MigrationStrategy};
    use siteplex_core::Database;
    use sqlx::any::AnyPoolOptions;
    use tempfile::TempDir;

    const MIGRATIONS: &[Migration] = &[
        Migration::new(1, "create items", "CREATE TABLE items (id INTEGER PRIMARY KEY)"),
        Migration::new(2, "seed items", "INSERT INTO items (id) VALUES (1); INSERT INTO items (id) VALUES (2);"),
    ];

    async fn sqlite(dir: &TempDir) -> Database {
        sqlx::any::install_default_drivers();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("schema.db").display());
        let pool = AnyPoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .unwrap();
        Database::from_pool("main", pool)
    }

    #[test]
    fn test_parse_file_stem() {
        assert_eq!(
            parse_file_stem("0001_create_users"),
            Some((1, "create users".to_string()))
        );
        assert_eq!(parse_file_stem("create_users"), None);
        assert_eq!(parse_file_stem("0003"), None);
    }

    #[test]
    fn test_record_version_bind_markers() {
        assert!(record_version_sql("MySQL").ends_with("VALUES (?, ?)"));
        assert!(record_version_sql("PostgreSQL").ends_with("VALUES ($1, $2)"));
        assert!(record_version_sql("SQLite").ends_with("VALUES ($1, $2)"));
    }

    #[test]
    fn test_duplicate_versions_rejected() {
        let result = SchemaMigrations::new(vec![
            Migration::new(1, "a", "SELECT 1"),
            Migration::new(1, "b", "SELECT 1"),
        ]);
        assert!(matches!(result, Err(MigrateError::InvalidMigrations(_))));
    }

    #[test]
    fn test_load_dir_sorts_and_validates() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("0002_second.sql"), "SELECT 2").unwrap();
        std::fs::write(dir.path().join("0001_first.sql"), "SELECT 1").unwrap();
        std::fs::write(dir.path().join("README.md"), "notes").unwrap();

        let migrations = SchemaMigrations::load_dir(dir.path()).unwrap();
        let versions: Vec<i64> = migrations.iter().map(|m| m.version).collect();
        assert_eq!(versions, vec![1, 2]);
        assert_eq!(migrations[0].description, "first");

        std::fs::write(dir.path().join("bad.sql"), "SELECT 3").unwrap();
        assert!(matches!(
            SchemaMigrations::load_dir(dir.path()),
            Err(MigrateError::InvalidMigrationFile { .. })
        ));
    }

    #[tokio::test]
    async fn test_apply_runs_each_migration_once() {
        let dir = TempDir::new().unwrap();
        let db = sqlite(&dir).await;

        assert_eq!(SchemaMigrations::current_version(db.pool()).await.unwrap(), None);

        let mut migrator = Direct.begin(&db).await.unwrap();
        assert_eq!(SchemaMigrations::apply(&mut migrator, MIGRATIONS).await.unwrap(), 2);
        Direct.finish(migrator, true).await.unwrap();

        let mut migrator = Direct.begin(&db).await.unwrap();
        assert_eq!(SchemaMigrations::apply(&mut migrator, MIGRATIONS).await.unwrap(), 0);
        Direct.finish(migrator, true).await.unwrap();

        assert_eq!(SchemaMigrations::current_version(db.pool()).await.unwrap(), Some(2));
        let descriptions: Vec<String> =
            sqlx::query_scalar("SELECT description FROM schema_migrations ORDER BY version")
                .fetch_all(db.pool())
                .await
                .unwrap();
        assert_eq!(descriptions, vec!["create items", "seed items"]);
        let items: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(items, 2);
    }
}
