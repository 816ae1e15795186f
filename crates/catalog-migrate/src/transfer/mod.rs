//! Per-record transfer of a legacy book into the normalized catalog.
//!
//! One source book is one transaction:
//!
//! 1. resolve the publisher (may insert a `publisher` row)
//! 2. insert the `catalog` row; an integrity violation rolls everything back
//!    and the record is skipped
//! 3. link subjects, authors and translators
//! 4. insert one `inventory` row per copy
//! 5. commit
//!
//! Errors other than the catalog integrity violation abort the record and are
//! returned to the caller.

mod crossref;
mod inventory;
mod resolver;
mod transform;

pub use crossref::{write_cross_references, LinkStats};
pub use inventory::expand_inventory;
pub use resolver::{ReferenceCache, ReferenceCacheEntry, ReferenceResolver};
pub use transform::{
    escape_literal, language_for_city, publish_date, transform, LanguageCode, TransformOptions,
};

use crate::error::Result;
use crate::source::BookRow;
use crate::target::{ReferenceTable, TargetSession};
use tracing::{debug, warn};

/// What happened to one source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Catalog row and its dependents were committed.
    Committed {
        catalog_id: i64,
        links: LinkStats,
        copies: u64,
    },
    /// The catalog insert hit an integrity violation; nothing was kept.
    Skipped,
}

/// Moves books one at a time through a [`TargetSession`].
pub struct TransferEngine {
    resolver: ReferenceResolver,
    options: TransformOptions,
}

impl TransferEngine {
    pub fn new(resolver: ReferenceResolver, options: TransformOptions) -> Self {
        Self { resolver, options }
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    /// Transfer one book inside its own transaction.
    ///
    /// On error the transaction is left open; the caller decides whether to
    /// roll it back (see [`TransferEngine::abort`]).
    pub async fn execute<T>(&mut self, target: &mut T, book: &BookRow) -> Result<RecordOutcome>
    where
        T: TargetSession + ?Sized,
    {
        target.begin().await?;

        let publisher_id = self
            .resolver
            .resolve(target, ReferenceTable::Publisher, book.publisher_id)
            .await?;
        let record = transform(book, publisher_id, &self.options);

        let Some(catalog_id) = target.insert_catalog(&record).await? else {
            warn!(
                "Skipping book {} (call number {:?}): catalog insert rejected",
                book.id, book.call_id
            );
            target.rollback().await?;
            self.resolver.rollback();
            return Ok(RecordOutcome::Skipped);
        };

        let links = write_cross_references(target, &mut self.resolver, catalog_id, book).await?;
        let copies = expand_inventory(target, catalog_id, book.qty).await?;

        target.commit().await?;
        self.resolver.commit();

        debug!(
            "Book {} -> catalog {} ({} links, {} copies)",
            book.id,
            catalog_id,
            links.total(),
            copies
        );

        Ok(RecordOutcome::Committed {
            catalog_id,
            links,
            copies,
        })
    }

    /// Roll back after a failed [`execute`](TransferEngine::execute).
    pub async fn abort<T>(&mut self, target: &mut T) -> Result<()>
    where
        T: TargetSession + ?Sized,
    {
        self.resolver.rollback();
        target.rollback().await
    }
}
