//! Destination catalog store.
//!
//! [`TargetSession`] is the statement and transaction surface the migration
//! drives. [`PgTarget`] runs it against PostgreSQL; [`DryRunTarget`] only logs
//! the statements it would have executed.

mod dry_run;
mod postgres;
mod tls;
mod types;

pub use dry_run::DryRunTarget;
pub use postgres::PgTarget;
pub use tls::SslMode;
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;

/// A single session against the destination store.
///
/// Statements between [`begin`](TargetSession::begin) and
/// [`commit`](TargetSession::commit) / [`rollback`](TargetSession::rollback)
/// form one atomic unit.
#[async_trait]
pub trait TargetSession: Send {
    /// Open a transaction.
    async fn begin(&mut self) -> Result<()>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Discard the open transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Insert a reference row and return its generated id.
    async fn insert_reference(&mut self, table: ReferenceTable, name: &str) -> Result<i64>;

    /// Insert a catalog row and return its generated id.
    ///
    /// Returns `Ok(None)` when the store rejects the row with an integrity
    /// violation (duplicate call number and the like). The open transaction
    /// is then unusable until rolled back. Any other failure is an error.
    async fn insert_catalog(&mut self, record: &CatalogRecord) -> Result<Option<i64>>;

    /// Insert a (catalog id, entity id) pair into a link table.
    async fn insert_link(&mut self, link: LinkTable, catalog_id: i64, entity_id: i64) -> Result<()>;

    /// Insert one inventory copy.
    async fn insert_inventory(&mut self, catalog_id: i64, copy_seq: i64) -> Result<()>;

    /// Round-trip a trivial query.
    async fn ping(&mut self) -> Result<()>;

    /// Get the database type.
    fn db_type(&self) -> &str;

    /// Close all connections.
    async fn close(&mut self);
}
