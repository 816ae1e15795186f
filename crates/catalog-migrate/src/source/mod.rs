//! Legacy catalog source: row types, the reader trait and the in-memory snapshot.

mod mysql;
mod types;

pub use mysql::MysqlReader;
pub use types::*;

use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// Trait for reading the legacy catalog tables.
///
/// Each call reads a whole table; the migration keeps everything in memory.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Load a reference table (`subject`, `publisher`, `author`) keyed by `ID`.
    async fn load_references(&self, source: ReferenceSource) -> Result<SourceTable<ReferenceRow>>;

    /// Load the `book` table keyed by `ID`.
    async fn load_books(&self) -> Result<SourceTable<BookRow>>;

    /// Round-trip a trivial query.
    async fn ping(&self) -> Result<()>;

    /// Get the database type.
    fn db_type(&self) -> &str;

    /// Close all connections.
    async fn close(&self);
}

/// Every legacy table the migration needs, loaded once at start.
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
    pub subjects: SourceTable<ReferenceRow>,
    pub publishers: SourceTable<ReferenceRow>,
    pub authors: SourceTable<ReferenceRow>,
    /// Translators live in the `author` table as well.
    pub translators: SourceTable<ReferenceRow>,
    pub books: SourceTable<BookRow>,
}

impl SourceSnapshot {
    /// Read all four legacy tables.
    pub async fn load<R: SourceReader + ?Sized>(reader: &R) -> Result<Self> {
        let subjects = reader.load_references(ReferenceSource::Subject).await?;
        let publishers = reader.load_references(ReferenceSource::Publisher).await?;
        let authors = reader.load_references(ReferenceSource::Author).await?;
        let translators = authors.clone();
        let books = reader.load_books().await?;

        info!(
            "Loaded source snapshot: {} subjects, {} publishers, {} authors, {} books",
            subjects.len(),
            publishers.len(),
            authors.len(),
            books.len()
        );

        Ok(Self {
            subjects,
            publishers,
            authors,
            translators,
            books,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySource;

    #[tokio::test]
    async fn test_snapshot_loads_translators_from_author_table() {
        let source = MemorySource::new()
            .with_reference(ReferenceSource::Author, ReferenceRow::new(1, "Lu Xun"))
            .with_reference(ReferenceSource::Publisher, ReferenceRow::new(9, "Sanlian"))
            .with_book(BookRow {
                id: 100,
                call_id: Some("I210/1".into()),
                ..Default::default()
            });

        let snapshot = SourceSnapshot::load(&source).await.unwrap();
        assert_eq!(snapshot.authors, snapshot.translators);
        assert_eq!(snapshot.translators[&1].name.as_deref(), Some("Lu Xun"));
        assert_eq!(snapshot.publishers.len(), 1);
        assert!(snapshot.subjects.is_empty());
        assert_eq!(snapshot.books[&100].call_id.as_deref(), Some("I210/1"));
    }

    #[tokio::test]
    async fn test_snapshot_propagates_reader_failure() {
        let source = MemorySource::new().failing_on(ReferenceSource::Publisher);
        let err = SourceSnapshot::load(&source).await.unwrap_err();
        assert!(matches!(
            err,
            crate::error::MigrateError::SchemaMismatch { ref table, .. } if table == "publisher"
        ));
    }
}
