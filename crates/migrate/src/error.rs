//! Error types for the migration engine.
//!
//! Every fatal error inside a run triggers a rollback of the in-flight
//! transaction before it is returned. The crate reports errors to the
//! caller; it never terminates the process itself.

use crate::definitions::Direction;

/// Result type alias for migration operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Errors produced by the migration engine
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The ledger table could not be created or verified; raised before any
    /// transaction is opened.
    #[error("Failed to create ledger table {table}: {source}")]
    TableSetup { table: String, source: sqlx::Error },

    /// A transaction could not be started, committed, or rolled back.
    #[error("Failed to {op} transaction: {source}")]
    Transaction { op: &'static str, source: sqlx::Error },

    /// A ledger lookup failed for a reason other than "not found".
    #[error("Failed to look up migration {id}: {source}")]
    Lookup { id: String, source: sqlx::Error },

    /// A migration payload (or its ledger insert/delete) failed; the whole
    /// run is rolled back.
    #[error("Failed to run {direction} migration {id}: {source}")]
    Execution {
        id: String,
        direction: Direction,
        source: sqlx::Error,
    },

    /// An unrecognized run direction was requested; fails fast with no side
    /// effects.
    #[error("Unknown migration direction '{0}', expected 'up' or 'down'")]
    InvalidDirection(String),

    /// The configured ledger table name is not a safe SQL identifier; raised
    /// at migrator construction, before any database work.
    #[error("Invalid ledger table name '{0}'")]
    InvalidTableName(String),

    /// A connection could not be established from a database URL.
    #[error("Failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),
}
