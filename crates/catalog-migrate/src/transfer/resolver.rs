//! Get-or-create mapping of legacy reference ids onto destination ids.
//!
//! Each [`ReferenceCache`] holds the legacy rows of one entity type. The first
//! lookup of a legacy id inserts a destination row and remembers its id; later
//! lookups return the remembered id without touching the store.
//!
//! Ids assigned inside the open transaction are provisional. `commit` makes
//! them permanent and `rollback` forgets them, so a rolled-back record never
//! leaves the cache pointing at a row that does not exist.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};

use crate::error::Result;
use crate::source::{BookRow, ReferenceRow, SourceSnapshot, SourceTable};
use crate::target::{ReferenceTable, TargetSession};

/// A legacy reference row plus its destination id once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceCacheEntry {
    pub record: ReferenceRow,
    new_id: Option<i64>,
}

impl ReferenceCacheEntry {
    pub fn new(record: ReferenceRow) -> Self {
        Self {
            record,
            new_id: None,
        }
    }

    /// Destination id, if this entity has been inserted.
    pub fn new_id(&self) -> Option<i64> {
        self.new_id
    }
}

/// Cache of one reference entity type, keyed by legacy id.
#[derive(Debug, Clone)]
pub struct ReferenceCache {
    table: ReferenceTable,
    entries: HashMap<i64, ReferenceCacheEntry>,
    /// Legacy ids resolved inside the open transaction.
    pending: Vec<i64>,
    /// Destination rows created and committed.
    created: u64,
}

impl ReferenceCache {
    pub fn new(table: ReferenceTable, rows: SourceTable<ReferenceRow>) -> Self {
        let entries = rows
            .into_iter()
            .map(|(id, row)| (id, ReferenceCacheEntry::new(row)))
            .collect();

        Self {
            table,
            entries,
            pending: Vec::new(),
            created: 0,
        }
    }

    pub fn get(&self, source_id: i64) -> Option<&ReferenceCacheEntry> {
        self.entries.get(&source_id)
    }

    /// Committed destination rows created through this cache.
    pub fn created(&self) -> u64 {
        self.created
    }

    /// Map `source_id` to a destination id, inserting the reference row on
    /// first use.
    ///
    /// Returns `Ok(None)` when `source_id` is null or unknown to the source
    /// snapshot; the caller treats that as "no linkage".
    pub async fn resolve<T>(&mut self, target: &mut T, source_id: Option<i64>) -> Result<Option<i64>>
    where
        T: TargetSession + ?Sized,
    {
        let table_name = self.table.table_name();

        let Some(source_id) = source_id else {
            debug!("Id null not found in {}", table_name);
            return Ok(None);
        };

        let Some(entry) = self.entries.get_mut(&source_id) else {
            warn!("Id {} not found in {}", source_id, table_name);
            return Ok(None);
        };

        if let Some(id) = entry.new_id {
            return Ok(Some(id));
        }

        let name = match entry.record.name.as_deref() {
            Some(name) => name,
            None => {
                warn!("{} {} has no name; inserting it with an empty one", table_name, source_id);
                ""
            }
        };

        let new_id = target.insert_reference(self.table, name).await?;
        entry.new_id = Some(new_id);
        self.pending.push(source_id);

        debug!("Resolved {} {} -> {}", table_name, source_id, new_id);
        Ok(Some(new_id))
    }

    /// Make ids assigned in the open transaction permanent.
    pub fn commit(&mut self) {
        self.created += self.pending.len() as u64;
        self.pending.clear();
    }

    /// Forget ids assigned in the open transaction.
    pub fn rollback(&mut self) {
        for source_id in self.pending.drain(..) {
            if let Some(entry) = self.entries.get_mut(&source_id) {
                entry.new_id = None;
            }
        }
    }
}

/// The four reference caches used by the migration.
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    publishers: ReferenceCache,
    subjects: ReferenceCache,
    authors: ReferenceCache,
    translators: ReferenceCache,
}

impl ReferenceResolver {
    /// Split a snapshot into reference caches and the books to migrate.
    pub fn from_snapshot(snapshot: SourceSnapshot) -> (Self, SourceTable<BookRow>) {
        let resolver = Self {
            publishers: ReferenceCache::new(ReferenceTable::Publisher, snapshot.publishers),
            subjects: ReferenceCache::new(ReferenceTable::Subject, snapshot.subjects),
            authors: ReferenceCache::new(ReferenceTable::Author, snapshot.authors),
            translators: ReferenceCache::new(ReferenceTable::Translator, snapshot.translators),
        };
        (resolver, snapshot.books)
    }

    pub fn cache(&self, table: ReferenceTable) -> &ReferenceCache {
        match table {
            ReferenceTable::Publisher => &self.publishers,
            ReferenceTable::Subject => &self.subjects,
            ReferenceTable::Author => &self.authors,
            ReferenceTable::Translator => &self.translators,
        }
    }

    fn cache_mut(&mut self, table: ReferenceTable) -> &mut ReferenceCache {
        match table {
            ReferenceTable::Publisher => &mut self.publishers,
            ReferenceTable::Subject => &mut self.subjects,
            ReferenceTable::Author => &mut self.authors,
            ReferenceTable::Translator => &mut self.translators,
        }
    }

    /// Resolve `source_id` against the cache for `table`.
    pub async fn resolve<T>(
        &mut self,
        target: &mut T,
        table: ReferenceTable,
        source_id: Option<i64>,
    ) -> Result<Option<i64>>
    where
        T: TargetSession + ?Sized,
    {
        self.cache_mut(table).resolve(target, source_id).await
    }

    pub fn commit(&mut self) {
        for table in ReferenceTable::ALL {
            self.cache_mut(table).commit();
        }
    }

    pub fn rollback(&mut self) {
        for table in ReferenceTable::ALL {
            self.cache_mut(table).rollback();
        }
    }

    /// Committed reference rows created, per destination table.
    pub fn created(&self) -> BTreeMap<ReferenceTable, u64> {
        ReferenceTable::ALL
            .into_iter()
            .map(|table| (table, self.cache(table).created()))
            .collect()
    }
}
