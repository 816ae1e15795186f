//! Catalog cross-reference rows (subjects, authors, translators).

use serde::{Deserialize, Serialize};

use super::resolver::ReferenceResolver;
use crate::error::Result;
use crate::source::BookRow;
use crate::target::{LinkTable, ReferenceTable, TargetSession};

/// Link rows written for one or more catalog records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkStats {
    pub subjects: u64,
    pub authors: u64,
    pub translators: u64,
}

impl LinkStats {
    pub fn total(&self) -> u64 {
        self.subjects + self.authors + self.translators
    }

    pub fn add(&mut self, other: LinkStats) {
        self.subjects += other.subjects;
        self.authors += other.authors;
        self.translators += other.translators;
    }

    fn count(&mut self, link: LinkTable) {
        match link {
            LinkTable::Subjects => self.subjects += 1,
            LinkTable::Authors => self.authors += 1,
            LinkTable::Translators => self.translators += 1,
        }
    }
}

fn positive(id: Option<i64>) -> Option<i64> {
    id.filter(|id| *id > 0)
}

/// Link `catalog_id` to the subject, authors and translator of `book`.
///
/// The English author is linked only when it is set, positive and differs
/// from the primary author; the translator only when set and positive.
/// References that do not resolve are skipped.
pub async fn write_cross_references<T>(
    target: &mut T,
    resolver: &mut ReferenceResolver,
    catalog_id: i64,
    book: &BookRow,
) -> Result<LinkStats>
where
    T: TargetSession + ?Sized,
{
    let mut wanted: Vec<(ReferenceTable, LinkTable, Option<i64>)> = vec![
        (ReferenceTable::Subject, LinkTable::Subjects, book.subject_id),
        (ReferenceTable::Author, LinkTable::Authors, book.author_id),
    ];

    if let Some(english) = positive(book.english_author_id) {
        if book.author_id != Some(english) {
            wanted.push((ReferenceTable::Author, LinkTable::Authors, Some(english)));
        }
    }

    if let Some(translator) = positive(book.translator_id) {
        wanted.push((ReferenceTable::Translator, LinkTable::Translators, Some(translator)));
    }

    let mut stats = LinkStats::default();
    for (reference, link, source_id) in wanted {
        if let Some(entity_id) = resolver.resolve(target, reference, source_id).await? {
            target.insert_link(link, catalog_id, entity_id).await?;
            stats.count(link);
        }
    }

    Ok(stats)
}
