//! Core types for the migration engine: the migration record, migrator
//! configuration, run direction, and run reporting.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MigrateError;

/// Default name of the ledger table tracking applied migrations.
pub const DEFAULT_LEDGER_TABLE: &str = "migrations";

/// A single schema/data migration.
///
/// A migration is identified by `id` and carries an optional SQL payload for
/// each direction. An absent payload is a valid no-op step: applying or
/// rolling it back still claims or releases its ledger slot.
///
/// Ordering is the caller-supplied list order, never derived from the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Migration {
    /// Unique identifier for the migration, unique within one run
    pub id: String,
    /// SQL statements executed when applying the migration
    pub up_sql: Option<String>,
    /// SQL statements executed when rolling the migration back
    pub down_sql: Option<String>,
}

impl Migration {
    /// Create a migration with no payloads.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            up_sql: None,
            down_sql: None,
        }
    }

    /// Attach the SQL payload executed when applying.
    pub fn up(mut self, sql: impl Into<String>) -> Self {
        self.up_sql = Some(sql.into());
        self
    }

    /// Attach the SQL payload executed when rolling back.
    pub fn down(mut self, sql: impl Into<String>) -> Self {
        self.down_sql = Some(sql.into());
        self
    }

    /// Build a migration by reading its payloads from `io::Read` sources
    /// (files, embedded assets, in-memory strings).
    ///
    /// Read failures surface here, at construction; a successfully built
    /// record is immutable and cannot fail later for I/O reasons.
    pub fn from_readers<U, D>(
        id: impl Into<String>,
        up: Option<U>,
        down: Option<D>,
    ) -> io::Result<Self>
    where
        U: Read,
        D: Read,
    {
        let up_sql = up.map(io::read_to_string).transpose()?;
        let down_sql = down.map(io::read_to_string).transpose()?;
        Ok(Self {
            id: id.into(),
            up_sql,
            down_sql,
        })
    }
}

/// Direction of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Apply pending migrations in list order
    Up,
    /// Roll applied migrations back in reverse list order
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => f.write_str("up"),
            Direction::Down => f.write_str("down"),
        }
    }
}

impl FromStr for Direction {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("up") {
            Ok(Direction::Up)
        } else if s.eq_ignore_ascii_case("down") {
            Ok(Direction::Down)
        } else {
            Err(MigrateError::InvalidDirection(s.to_string()))
        }
    }
}

/// Configuration for a [`Migrator`](crate::Migrator).
///
/// Assembled once before the first run; the migrator keeps no other state
/// between runs. Everything else lives in the ledger table.
#[derive(Debug, Clone)]
pub struct MigratorConfig {
    /// Ordered migration list; insertion order is apply order
    pub migrations: Vec<Migration>,
    /// Name of the ledger table tracking applied migration ids
    pub ledger_table: String,
    /// Emit per-migration progress messages through `tracing`
    pub debug_log: bool,
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            migrations: Vec::new(),
            ledger_table: DEFAULT_LEDGER_TABLE.to_string(),
            debug_log: false,
        }
    }
}

/// Outcome of one migration run.
#[derive(Debug)]
pub struct RunReport {
    /// Direction the run executed in
    pub direction: Direction,
    /// Ids whose payload was executed, in execution order
    pub executed: Vec<String>,
    /// Number of records skipped (already applied on up, never applied on down)
    pub skipped: usize,
    /// Total execution time in milliseconds
    pub execution_time_ms: u128,
}

/// Whether a configured migration is recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationStatus {
    /// Not present in the ledger
    Pending,
    /// Present in the ledger
    Applied,
}
