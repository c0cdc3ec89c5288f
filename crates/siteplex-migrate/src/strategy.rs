//! Migration strategies
//!
//! Every migration runs inside one transaction per database. The strategy
//! decides how that transaction ends:
//! - [`Direct`] commits on success and rolls back on failure
//! - [`DryRun`] logs every statement and always rolls back

use async_trait::async_trait;
use siteplex_core::Database;
use sqlx::{Any, Transaction};
use tracing::{debug, info, trace, warn};

use crate::error::Result;

const SQL_TARGET: &str = "siteplex::migrate::sql";

/// Executes migration SQL for one database inside a transaction
pub struct Migrator {
    database: String,
    pub(crate) tx: Transaction<'static, Any>,
    dry_run: bool,
    executed: Vec<String>,
}

impl Migrator {
    async fn begin(db: &Database, dry_run: bool) -> Result<Self> {
        let tx = db.pool().begin().await?;
        Ok(Self {
            database: db.name().to_string(),
            tx,
            dry_run,
            executed: Vec::new(),
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    /// Whether the transaction is rolled back regardless of outcome
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Statements executed so far
    pub fn executed(&self) -> &[String] {
        &self.executed
    }

    /// Driver name of the connection, e.g. `SQLite` or `MySQL`
    pub fn backend_name(&self) -> &str {
        self.tx.backend_name()
    }

    /// Record a statement about to run in the transaction
    pub fn log_statement(&mut self, sql: &str) {
        if self.dry_run {
            debug!(target: SQL_TARGET, database = %self.database, "{}", sql.trim());
        } else {
            trace!(target: SQL_TARGET, database = %self.database, "{}", sql.trim());
        }
        self.executed.push(sql.trim().to_string());
    }

    /// Execute one statement, returning the affected row count
    pub async fn execute(&mut self, sql: &str) -> Result<u64> {
        self.log_statement(sql);
        let done = sqlx::query::<Any>(sql).execute(&mut *self.tx).await?;
        Ok(done.rows_affected())
    }

    /// Execute a script that may hold several statements
    pub async fn execute_script(&mut self, sql: &str) -> Result<()> {
        self.log_statement(sql);
        sqlx::Executor::execute(&mut *self.tx, sqlx::raw_sql(sql)).await?;
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// How a migration transaction is opened and closed
#[async_trait]
pub trait MigrationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn begin(&self, db: &Database) -> Result<Migrator>;

    /// Close the transaction after the migration handlers ran
    async fn finish(&self, migrator: Migrator, succeeded: bool) -> Result<()>;
}

/// Persist migrations that succeed
#[derive(Debug, Clone, Copy, Default)]
pub struct Direct;

#[async_trait]
impl MigrationStrategy for Direct {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn begin(&self, db: &Database) -> Result<Migrator> {
        Migrator::begin(db, false).await
    }

    async fn finish(&self, migrator: Migrator, succeeded: bool) -> Result<()> {
        let database = migrator.database.clone();
        if succeeded {
            let statements = migrator.executed.len();
            migrator.commit().await?;
            debug!("Committed {} statement(s) on {:?}", statements, database);
        } else {
            migrator.rollback().await?;
            warn!("Rolled back failed migration on {:?}", database);
        }
        Ok(())
    }
}

/// Validate migrations without persisting them
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRun;

#[async_trait]
impl MigrationStrategy for DryRun {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    async fn begin(&self, db: &Database) -> Result<Migrator> {
        Migrator::begin(db, true).await
    }

    async fn finish(&self, migrator: Migrator, succeeded: bool) -> Result<()> {
        let database = migrator.database.clone();
        let statements = migrator.executed.len();
        migrator.rollback().await?;
        info!(
            "Dry run on {:?}: {} statement(s) rolled back ({})",
            database,
            statements,
            if succeeded { "ok" } else { "failed" }
        );
        Ok(())
    }
}

/// Strategy for a migrate event's commit-disabled flag
pub fn strategy_for(commit_disabled: bool) -> &'static dyn MigrationStrategy {
    if commit_disabled { &DryRun } else { &Direct }
}
