//! # tidemark-migrate: Transactional schema migrations for PostgreSQL
//!
//! Applies and rolls back an ordered list of SQL migrations, tracking which
//! ids have already run in a ledger table so re-invocation is idempotent.
//! A whole run (every pending migration plus its ledger bookkeeping) lives
//! inside one transaction: it either commits completely or leaves the
//! database untouched.
//!
//! ```no_run
//! use tidemark_migrate::{Migration, Migrator, MigratorConfig};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let migrations = vec![
//!     Migration::new("1")
//!         .up("CREATE TABLE users (id SERIAL PRIMARY KEY, name TEXT NOT NULL)")
//!         .down("DROP TABLE users"),
//!     Migration::new("2")
//!         .up("ALTER TABLE users ADD email TEXT")
//!         .down("ALTER TABLE users DROP email"),
//! ];
//!
//! let config = MigratorConfig {
//!     migrations,
//!     ..Default::default()
//! };
//! let migrator = Migrator::from_url("postgres://localhost/app", config).await?;
//! migrator.migrate_up().await?;
//! # Ok(())
//! # }
//! ```
//!
//! Migration order is the list order (reverse list order when rolling back),
//! never derived from the id values. A record with no payload for a direction
//! is a valid no-op step that still claims or releases its ledger slot.
//!
//! Concurrent migrators (two processes racing to migrate the same database)
//! are resolved by the store's transaction isolation, not by this crate: the
//! first commit for a given id wins, and exactly-once execution under such
//! races requires a serializable isolation level.

pub mod definitions;
pub mod error;
pub mod ledger;
pub mod runner;


pub use definitions::*;
pub use error::*;
pub use ledger::*;
pub use runner::*;
