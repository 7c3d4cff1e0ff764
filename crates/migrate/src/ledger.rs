//! Ledger store: the table of applied migration ids.
//!
//! Row presence means "applied". The table is created idempotently before a
//! run; all per-id operations execute inside the caller's transaction so that
//! "marked applied" and "payload executed" commit or roll back together.

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{MigrateError, MigrateResult};

/// Ledger over a single table with one `TEXT PRIMARY KEY` column of
/// migration ids.
#[derive(Debug, Clone)]
pub struct Ledger {
    table: String,
}

impl Ledger {
    /// Create a ledger over the named table.
    ///
    /// The name is interpolated into SQL statements, so it must be a plain
    /// identifier; anything else is rejected here, before any database work.
    pub fn new(table: impl Into<String>) -> MigrateResult<Self> {
        let table = table.into();
        if !is_valid_identifier(&table) {
            return Err(MigrateError::InvalidTableName(table));
        }
        Ok(Self { table })
    }

    /// Name of the underlying table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Create the ledger table if it does not exist yet.
    pub async fn ensure(&self, pool: &PgPool) -> MigrateResult<()> {
        sqlx::query(&self.create_table_sql())
            .execute(pool)
            .await
            .map_err(|source| MigrateError::TableSetup {
                table: self.table.clone(),
                source,
            })?;
        Ok(())
    }

    /// Whether `id` is recorded as applied.
    ///
    /// The lookup is tri-state: found, not found, or a query error. Only the
    /// error case aborts the run, with no distinction between its causes.
    pub async fn contains(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
    ) -> MigrateResult<bool> {
        let row = sqlx::query(&self.lookup_sql())
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|source| MigrateError::Lookup {
                id: id.to_string(),
                source,
            })?;
        Ok(row.is_some())
    }

    /// Record `id` as applied within the caller's transaction.
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(&self.insert_sql())
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Remove `id` from the ledger within the caller's transaction.
    pub async fn delete(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(&self.delete_sql())
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    fn create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY)",
            self.table
        )
    }

    fn lookup_sql(&self) -> String {
        format!("SELECT id FROM {} WHERE id = $1", self.table)
    }

    fn insert_sql(&self) -> String {
        format!("INSERT INTO {} (id) VALUES ($1)", self.table)
    }

    fn delete_sql(&self) -> String {
        format!("DELETE FROM {} WHERE id = $1", self.table)
    }
}

/// Validate a SQL identifier: leading letter or underscore, then letters,
/// digits, underscores, or dollar signs.
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("migrations"));
        assert!(is_valid_identifier("_migrations_3"));
        assert!(is_valid_identifier("schema$audit"));

        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("3migrations"));
        assert!(!is_valid_identifier("migrations; DROP TABLE users"));
        assert!(!is_valid_identifier("migra tions"));
        assert!(!is_valid_identifier("migrations\"--"));
    }

    #[test]
    fn test_rejects_unsafe_table_name() {
        let err = Ledger::new("migrations; --").unwrap_err();
        assert!(matches!(err, MigrateError::InvalidTableName(_)));
    }

    #[test]
    fn test_sql_generation() {
        let ledger = Ledger::new("migrations").unwrap();

        let create = ledger.create_table_sql();
        assert!(create.contains("CREATE TABLE IF NOT EXISTS migrations"));
        assert!(create.contains("id TEXT PRIMARY KEY"));

        assert_eq!(
            ledger.lookup_sql(),
            "SELECT id FROM migrations WHERE id = $1"
        );
        assert_eq!(
            ledger.insert_sql(),
            "INSERT INTO migrations (id) VALUES ($1)"
        );
        assert_eq!(
            ledger.delete_sql(),
            "DELETE FROM migrations WHERE id = $1"
        );
    }

    #[test]
    fn test_sql_generation_custom_table() {
        let ledger = Ledger::new("migrations_3").unwrap();
        assert!(ledger.lookup_sql().contains("FROM migrations_3"));
        assert!(ledger.insert_sql().contains("INTO migrations_3"));
    }
}
