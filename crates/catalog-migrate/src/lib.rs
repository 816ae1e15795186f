//! # catalog-migrate
//!
//! Migrates a legacy MySQL library catalog into a normalized PostgreSQL
//! catalog.
//!
//! The legacy store keeps `subject`, `publisher`, `author` and `book` tables
//! where each book carries foreign ids for its publisher, subject, authors and
//! translator plus a copy count. The migration:
//!
//! - **Loads** every legacy table into memory, keyed by source id
//! - **Creates references lazily**, inserting a publisher, subject, author or
//!   translator only when a migrated book first needs it
//! - **Writes each book in one transaction** with its cross-references and
//!   one inventory row per copy
//! - **Skips** books whose catalog insert violates an integrity constraint
//!
//! ## Example
//!
//! ```rust,no_run
//! use catalog_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> catalog_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let mut orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Migrated {} books", result.records_committed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod source;
pub mod target;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use error::{MigrateError, Result};
pub use orchestrator::{HealthCheckResult, MigrationResult, Orchestrator};
pub use source::{MysqlReader, SourceReader, SourceSnapshot};
pub use target::{DryRunTarget, PgTarget, SslMode, TargetSession};
pub use transfer::{LanguageCode, RecordOutcome, TransferEngine, TransformOptions};
