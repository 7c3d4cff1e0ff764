//! Migration engine and the [`Migrator`] facade.
//!
//! A run ensures the ledger table exists, opens one transaction for the
//! whole migration list, applies or rolls back each record in order, and
//! commits only after every record has been processed. Any failure rolls the
//! entire run back, so the ledger and the schema never diverge.

use std::time::Instant;

use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};

use crate::definitions::{Direction, Migration, MigrationStatus, MigratorConfig, RunReport};
use crate::error::{MigrateError, MigrateResult};
use crate::ledger::Ledger;

/// What happened to a single record during a run.
enum StepOutcome {
    /// Ledger updated and payload (if any) executed
    Executed,
    /// Already applied on up, never applied on down
    Skipped,
}

/// Applies and rolls back an ordered migration list against PostgreSQL.
///
/// Holds the connection pool and configuration; stateless across runs apart
/// from what the ledger table records. One run is strictly sequential. Racing
/// migrators from separate processes are resolved by the store's transaction
/// isolation: both open independent transactions and the first commit for a
/// given id wins, so exactly-once execution under concurrent runs requires a
/// serializable isolation level on the caller's side.
pub struct Migrator {
    pool: PgPool,
    ledger: Ledger,
    config: MigratorConfig,
}

impl Migrator {
    /// Create a migrator over an existing pool.
    ///
    /// Fails if the configured ledger table name is not a plain SQL
    /// identifier.
    pub fn new(pool: PgPool, config: MigratorConfig) -> MigrateResult<Self> {
        let ledger = Ledger::new(config.ledger_table.clone())?;
        Ok(Self {
            pool,
            ledger,
            config,
        })
    }

    /// Create a migrator by connecting to a database URL.
    pub async fn from_url(database_url: &str, config: MigratorConfig) -> MigrateResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(MigrateError::Connect)?;
        Self::new(pool, config)
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get the configuration.
    pub fn config(&self) -> &MigratorConfig {
        &self.config
    }

    /// Apply every not-yet-applied migration, in list order.
    pub async fn migrate_up(&self) -> MigrateResult<RunReport> {
        self.run(Direction::Up).await
    }

    /// Roll every applied migration back, in reverse list order.
    pub async fn migrate_down(&self) -> MigrateResult<RunReport> {
        self.run(Direction::Down).await
    }

    /// Report, in configured order, which migrations the ledger records as
    /// applied. Read-only apart from creating the ledger table if absent.
    pub async fn status(&self) -> MigrateResult<Vec<(String, MigrationStatus)>> {
        self.ledger.ensure(&self.pool).await?;
        let mut tx = self.begin().await?;

        let mut statuses = Vec::with_capacity(self.config.migrations.len());
        for migration in &self.config.migrations {
            match self.ledger.contains(&mut tx, &migration.id).await {
                Ok(applied) => statuses.push((
                    migration.id.clone(),
                    if applied {
                        MigrationStatus::Applied
                    } else {
                        MigrationStatus::Pending
                    },
                )),
                Err(err) => {
                    tx.rollback().await.ok();
                    return Err(err);
                }
            }
        }

        tx.commit().await.map_err(|source| MigrateError::Transaction {
            op: "commit",
            source,
        })?;
        Ok(statuses)
    }

    /// Execute one full run: ensure the ledger, open one transaction, walk
    /// the plan, and commit, rolling everything back on the first error.
    async fn run(&self, direction: Direction) -> MigrateResult<RunReport> {
        let started = Instant::now();
        if self.config.debug_log {
            debug!(%direction, table = %self.ledger.table(), "starting migration run");
        }

        self.ledger.ensure(&self.pool).await?;
        let mut tx = self.begin().await?;

        let mut executed = Vec::new();
        let mut skipped = 0usize;

        for migration in ordered(&self.config.migrations, direction) {
            let outcome = match direction {
                Direction::Up => self.apply(&mut tx, migration).await,
                Direction::Down => self.revert(&mut tx, migration).await,
            };
            match outcome {
                Ok(StepOutcome::Executed) => executed.push(migration.id.clone()),
                Ok(StepOutcome::Skipped) => skipped += 1,
                Err(err) => {
                    if self.config.debug_log {
                        warn!(id = %migration.id, %direction, "migration failed, rolling back run");
                    }
                    // Best effort; sqlx also rolls back on drop.
                    tx.rollback().await.ok();
                    return Err(err);
                }
            }
        }

        tx.commit().await.map_err(|source| MigrateError::Transaction {
            op: "commit",
            source,
        })?;

        if self.config.debug_log {
            debug!(%direction, executed = executed.len(), skipped, "migration run committed");
        }
        Ok(RunReport {
            direction,
            executed,
            skipped,
            execution_time_ms: started.elapsed().as_millis(),
        })
    }

    async fn begin(&self) -> MigrateResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|source| MigrateError::Transaction {
                op: "begin",
                source,
            })
    }

    /// Apply one record: skip if the ledger already has it, otherwise insert
    /// the ledger row and execute the up payload in the same transaction.
    async fn apply(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        migration: &Migration,
    ) -> MigrateResult<StepOutcome> {
        if self.ledger.contains(tx, &migration.id).await? {
            if self.config.debug_log {
                debug!(id = %migration.id, "skipping migration, already applied");
            }
            return Ok(StepOutcome::Skipped);
        }

        if self.config.debug_log {
            debug!(id = %migration.id, "applying migration");
        }
        self.ledger
            .insert(tx, &migration.id)
            .await
            .map_err(|source| MigrateError::Execution {
                id: migration.id.clone(),
                direction: Direction::Up,
                source,
            })?;

        // Absent payload is a no-op migration; the ledger row stays.
        if let Some(sql) = &migration.up_sql {
            self.execute_payload(tx, &migration.id, Direction::Up, sql)
                .await?;
        }
        Ok(StepOutcome::Executed)
    }

    /// Roll one record back: skip if the ledger does not have it, otherwise
    /// delete the ledger row and execute the down payload in the same
    /// transaction.
    async fn revert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        migration: &Migration,
    ) -> MigrateResult<StepOutcome> {
        if !self.ledger.contains(tx, &migration.id).await? {
            if self.config.debug_log {
                debug!(id = %migration.id, "skipping migration, not applied");
            }
            return Ok(StepOutcome::Skipped);
        }

        if self.config.debug_log {
            debug!(id = %migration.id, "rolling back migration");
        }
        self.ledger
            .delete(tx, &migration.id)
            .await
            .map_err(|source| MigrateError::Execution {
                id: migration.id.clone(),
                direction: Direction::Down,
                source,
            })?;

        if let Some(sql) = &migration.down_sql {
            self.execute_payload(tx, &migration.id, Direction::Down, sql)
                .await?;
        }
        Ok(StepOutcome::Executed)
    }

    /// Run every statement of a payload against the transaction.
    async fn execute_payload(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
        direction: Direction,
        sql: &str,
    ) -> MigrateResult<()> {
        if sql.trim().is_empty() {
            return Ok(());
        }
        for statement in split_statements(sql) {
            sqlx::query(&statement)
                .execute(&mut **tx)
                .await
                .map_err(|source| MigrateError::Execution {
                    id: id.to_string(),
                    direction,
                    source,
                })?;
        }
        Ok(())
    }
}

/// Execution order for a run: list order going up, reverse going down.
fn ordered(migrations: &[Migration], direction: Direction) -> Vec<&Migration> {
    match direction {
        Direction::Up => migrations.iter().collect(),
        Direction::Down => migrations.iter().rev().collect(),
    }
}

/// Split a payload into individual statements.
///
/// Prepared statements reject multi-statement strings, so payloads are parsed
/// and executed one statement at a time. Unparseable input falls back to
/// naive semicolon splitting.
fn split_statements(sql: &str) -> Vec<String> {
    let dialect = GenericDialect {};
    match Parser::parse_sql(&dialect, sql) {
        Ok(parsed) => parsed.iter().map(|stmt| format!("{};", stmt)).collect(),
        Err(e) => {
            warn!("SQL parsing failed, using naive semicolon splitting: {}", e);
            sql.split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| format!("{};", s))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(ids: &[&str]) -> Vec<Migration> {
        ids.iter().map(|id| Migration::new(*id)).collect()
    }

    #[test]
    fn test_up_order_is_list_order() {
        let migrations = list(&["1", "2", "3"]);
        let plan: Vec<&str> = ordered(&migrations, Direction::Up)
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(plan, ["1", "2", "3"]);
    }

    #[test]
    fn test_down_order_is_reverse_list_order() {
        let migrations = list(&["1", "2", "3"]);
        let plan: Vec<&str> = ordered(&migrations, Direction::Down)
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(plan, ["3", "2", "1"]);
    }

    #[test]
    fn test_order_ignores_id_values() {
        // Ordering comes from the list, not from the ids.
        let migrations = list(&["20", "3", "100"]);
        let plan: Vec<&str> = ordered(&migrations, Direction::Up)
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(plan, ["20", "3", "100"]);
    }

    #[test]
    fn test_split_statements_multiple() {
        let statements =
            split_statements("CREATE TABLE a (id INT); INSERT INTO a (id) VALUES (1)");
        assert_eq!(statements.len(), 2);
        assert!(statements[0].contains("CREATE TABLE"));
        assert!(statements[1].contains("INSERT INTO"));
    }

    #[test]
    fn test_split_statements_single() {
        let statements = split_statements("DELETE FROM a WHERE id = 2");
        assert_eq!(statements.len(), 1);
        assert!(statements[0].contains("DELETE FROM"));
    }

    #[test]
    fn test_split_statements_fallback() {
        // Not parseable as SQL; falls back to semicolon splitting.
        let statements = split_statements("FROBNICATE 1; TWIDDLE 2");
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "FROBNICATE 1;");
        assert_eq!(statements[1], "TWIDDLE 2;");
    }

    #[test]
    fn test_split_statements_empty() {
        assert!(split_statements("").is_empty());
    }
}
