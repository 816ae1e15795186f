//! In-memory source and target used by unit tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::{MigrateError, Result};
use crate::source::{BookRow, ReferenceRow, ReferenceSource, SourceReader, SourceTable};
use crate::target::{CatalogRecord, LinkTable, ReferenceTable, TargetSession};

/// Source reader backed by in-memory tables.
#[derive(Debug, Default)]
pub struct MemorySource {
    references: HashMap<ReferenceSource, SourceTable<ReferenceRow>>,
    books: SourceTable<BookRow>,
    failing: Option<ReferenceSource>,
    closed: AtomicBool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reference(mut self, source: ReferenceSource, row: ReferenceRow) -> Self {
        self.references.entry(source).or_default().insert(row.id, row);
        self
    }

    pub fn with_book(mut self, book: BookRow) -> Self {
        self.books.insert(book.id, book);
        self
    }

    /// Make loading `source` fail as if its `ID` column were missing.
    pub fn failing_on(mut self, source: ReferenceSource) -> Self {
        self.failing = Some(source);
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn load_references(&self, source: ReferenceSource) -> Result<SourceTable<ReferenceRow>> {
        if self.failing == Some(source) {
            return Err(MigrateError::schema_mismatch(source.table_name(), "ID"));
        }
        Ok(self.references.get(&source).cloned().unwrap_or_default())
    }

    async fn load_books(&self) -> Result<SourceTable<BookRow>> {
        Ok(self.books.clone())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Rows visible in the store.
#[derive(Debug, Clone, Default)]
struct Tables {
    references: BTreeMap<ReferenceTable, Vec<(i64, String)>>,
    catalog: Vec<(i64, CatalogRecord)>,
    links: HashMap<LinkTable, Vec<(i64, i64)>>,
    inventory: Vec<(i64, i64)>,
}

/// Target session that models transactions, unique call numbers and
/// non-transactional id sequences.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    committed: Tables,
    open: Option<Tables>,
    aborted: bool,
    next_id: i64,
    reference_inserts: HashMap<ReferenceTable, u64>,
    fail_links: bool,
    fail_inventory: bool,
    fail_catalog: Option<String>,
    closed: bool,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a committed catalog row with `call_id`.
    pub fn with_existing_call_id(mut self, call_id: &str) -> Self {
        self.next_id += 1;
        self.committed.catalog.push((
            -self.next_id,
            CatalogRecord {
                call_id: Some(call_id.to_string()),
                name: None,
                alt_name: None,
                edition: None,
                language: Default::default(),
                format: "book".into(),
                publish_date: None,
                publisher_id: None,
            },
        ));
        self
    }

    /// Make every link insert fail with a non-integrity error.
    pub fn failing_links(mut self) -> Self {
        self.fail_links = true;
        self
    }

    /// Make every inventory insert fail with a non-integrity error.
    pub fn failing_inventory(mut self) -> Self {
        self.fail_inventory = true;
        self
    }

    /// Make the catalog insert for `call_id` fail with a non-integrity error.
    pub fn failing_catalog(mut self, call_id: &str) -> Self {
        self.fail_catalog = Some(call_id.to_string());
        self
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn in_transaction(&self) -> bool {
        self.open.is_some()
    }

    /// Reference inserts attempted, including rolled-back ones.
    pub fn reference_inserts(&self, table: ReferenceTable) -> u64 {
        self.reference_inserts.get(&table).copied().unwrap_or(0)
    }

    pub fn committed_references(&self, table: ReferenceTable) -> usize {
        self.committed.references.get(&table).map_or(0, Vec::len)
    }

    pub fn reference_name(&self, table: ReferenceTable, id: i64) -> Option<String> {
        self.committed
            .references
            .get(&table)?
            .iter()
            .find(|(row_id, _)| *row_id == id)
            .map(|(_, name)| name.clone())
    }

    /// Committed catalog rows created by the migration.
    pub fn catalog(&self) -> Vec<(i64, CatalogRecord)> {
        self.committed
            .catalog
            .iter()
            .filter(|(id, _)| *id > 0)
            .cloned()
            .collect()
    }

    pub fn links(&self, link: LinkTable) -> Vec<(i64, i64)> {
        self.committed.links.get(&link).cloned().unwrap_or_default()
    }

    pub fn inventory(&self) -> Vec<(i64, i64)> {
        self.committed.inventory.clone()
    }

    /// Tables written by the next statement: the open transaction, or the
    /// committed state in autocommit mode.
    fn writable(&mut self) -> Result<&mut Tables> {
        if self.aborted {
            return Err(MigrateError::pool(
                "current transaction is aborted",
                "memory target",
            ));
        }
        Ok(match self.open.as_mut() {
            Some(tables) => tables,
            None => &mut self.committed,
        })
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[async_trait]
impl TargetSession for MemoryTarget {
    async fn begin(&mut self) -> Result<()> {
        if self.open.is_some() {
            return Err(MigrateError::pool("transaction already open", "memory target"));
        }
        self.open = Some(self.committed.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if self.aborted {
            return Err(MigrateError::pool(
                "cannot commit an aborted transaction",
                "memory target",
            ));
        }
        if let Some(tables) = self.open.take() {
            self.committed = tables;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.open = None;
        self.aborted = false;
        Ok(())
    }

    async fn insert_reference(&mut self, table: ReferenceTable, name: &str) -> Result<i64> {
        let id = self.allocate_id();
        self.writable()?
            .references
            .entry(table)
            .or_default()
            .push((id, name.to_string()));
        *self.reference_inserts.entry(table).or_insert(0) += 1;
        Ok(id)
    }

    async fn insert_catalog(&mut self, record: &CatalogRecord) -> Result<Option<i64>> {
        if self.fail_catalog.is_some() && self.fail_catalog == record.call_id {
            return Err(MigrateError::pool("connection reset", "memory target"));
        }
        let id = self.allocate_id();
        let tables = self.writable()?;
        let duplicate = record.call_id.is_some()
            && tables
                .catalog
                .iter()
                .any(|(_, existing)| existing.call_id == record.call_id);
        if duplicate {
            self.aborted = self.open.is_some();
            return Ok(None);
        }
        tables.catalog.push((id, record.clone()));
        Ok(Some(id))
    }

    async fn insert_link(&mut self, link: LinkTable, catalog_id: i64, entity_id: i64) -> Result<()> {
        if self.fail_links {
            return Err(MigrateError::pool("connection reset", "memory target"));
        }
        let rows = self.writable()?.links.entry(link).or_default();
        if rows.contains(&(catalog_id, entity_id)) {
            return Err(MigrateError::pool(
                format!("duplicate link in {}", link.table_name()),
                "memory target",
            ));
        }
        rows.push((catalog_id, entity_id));
        Ok(())
    }

    async fn insert_inventory(&mut self, catalog_id: i64, copy_seq: i64) -> Result<()> {
        if self.fail_inventory {
            return Err(MigrateError::pool("connection reset", "memory target"));
        }
        self.writable()?.inventory.push((catalog_id, copy_seq));
        Ok(())
    }

    async fn ping(&mut self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}
