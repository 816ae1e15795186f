//! Target session that executes nothing.
//!
//! Each statement is rendered with inline literals and logged at debug level;
//! generated ids come from a local counter.

use async_trait::async_trait;
use tracing::debug;

use super::types::{CatalogRecord, LinkTable, ReferenceTable, CATALOG_TABLE, INVENTORY_TABLE};
use super::TargetSession;
use crate::error::Result;
use crate::transfer::escape_literal;

/// Dry-run target session.
#[derive(Debug, Default)]
pub struct DryRunTarget {
    next_id: i64,
    statements: u64,
}

impl DryRunTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of data statements rendered so far.
    pub fn statements(&self) -> u64 {
        self.statements
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn emit(&mut self, sql: String) {
        self.statements += 1;
        debug!("[dry-run] {}", sql);
    }
}

/// Render an optional text value as a SQL literal.
fn text_literal(value: Option<&str>) -> String {
    match value {
        Some(s) => format!("'{}'", escape_literal(s)),
        None => "null".to_string(),
    }
}

/// Render the INSERT a catalog row would produce.
fn render_catalog_insert(record: &CatalogRecord) -> String {
    format!(
        "insert into {}(call_id, name, alt_name, edition, lang, format, publish_date, publisher_id) \
         values({}, {}, {}, {}, '{}', {}, {}, {})",
        CATALOG_TABLE,
        text_literal(record.call_id.as_deref()),
        text_literal(record.name.as_deref()),
        text_literal(record.alt_name.as_deref()),
        text_literal(record.edition.as_deref()),
        record.language.as_str(),
        text_literal(Some(&record.format)),
        record
            .publish_date
            .map(|d| format!("'{}'", d))
            .unwrap_or_else(|| "null".to_string()),
        record
            .publisher_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "null".to_string()),
    )
}

#[async_trait]
impl TargetSession for DryRunTarget {
    async fn begin(&mut self) -> Result<()> {
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        Ok(())
    }

    async fn insert_reference(&mut self, table: ReferenceTable, name: &str) -> Result<i64> {
        self.emit(format!(
            "insert into {}(name) values({})",
            table.table_name(),
            text_literal(Some(name))
        ));
        Ok(self.allocate_id())
    }

    async fn insert_catalog(&mut self, record: &CatalogRecord) -> Result<Option<i64>> {
        self.emit(render_catalog_insert(record));
        Ok(Some(self.allocate_id()))
    }

    async fn insert_link(&mut self, link: LinkTable, catalog_id: i64, entity_id: i64) -> Result<()> {
        self.emit(format!(
            "insert into {}(catalog_id, {}) values({}, {})",
            link.table_name(),
            link.entity_column(),
            catalog_id,
            entity_id
        ));
        Ok(())
    }

    async fn insert_inventory(&mut self, catalog_id: i64, copy_seq: i64) -> Result<()> {
        self.emit(format!(
            "insert into {}(catalog_id, copy_seq) values({}, {})",
            INVENTORY_TABLE, catalog_id, copy_seq
        ));
        Ok(())
    }

    async fn ping(&mut self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "dry-run"
    }

    async fn close(&mut self) {
        debug!("[dry-run] {} statements rendered", self.statements);
    }
}
