//! Legacy catalog row types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Source rows keyed by their legacy `ID`, iterated in ascending id order.
pub type SourceTable<T> = BTreeMap<i64, T>;

/// Legacy tables that hold named reference entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSource {
    Subject,
    Publisher,
    /// Holds both authors and translators.
    Author,
}

impl ReferenceSource {
    /// Legacy table name.
    pub fn table_name(&self) -> &'static str {
        match self {
            ReferenceSource::Subject => "subject",
            ReferenceSource::Publisher => "publisher",
            ReferenceSource::Author => "author",
        }
    }
}

/// Legacy `book` table name.
pub const BOOK_TABLE: &str = "book";

/// A row from `subject`, `publisher` or `author`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceRow {
    /// Legacy `ID`.
    pub id: i64,

    /// Legacy `NAME`.
    pub name: Option<String>,
}

impl ReferenceRow {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Some(name.into()),
        }
    }
}

/// A row from the legacy `book` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRow {
    /// Legacy `ID`.
    pub id: i64,

    /// `CALL_ID`: shelf call number, unique in the catalog.
    pub call_id: Option<String>,

    /// `CHN_NAME`: primary (Chinese) title.
    pub chn_name: Option<String>,

    /// `ENG_NAME`: alternate (English) title.
    pub eng_name: Option<String>,

    /// `EDITION`.
    pub edition: Option<String>,

    /// `PUBLISHED_YEAR`; zero or negative means unknown.
    pub published_year: Option<i64>,

    /// `PUBLISHER_ID` into `publisher`.
    pub publisher_id: Option<i64>,

    /// `SUBJECT_ID` into `subject`.
    pub subject_id: Option<i64>,

    /// `AUTHOR_ID` into `author`.
    pub author_id: Option<i64>,

    /// `ENGLISH_AUTHOR_ID` into `author`.
    pub english_author_id: Option<i64>,

    /// `TRANSLATOR_ID` into `author`.
    pub translator_id: Option<i64>,

    /// `QTY`: number of physical copies.
    pub qty: Option<i64>,
}

/// Build a keyed table from rows, later duplicates replacing earlier ones.
pub fn key_by_id<T>(rows: impl IntoIterator<Item = T>, id: impl Fn(&T) -> i64) -> SourceTable<T> {
    rows.into_iter().map(|row| (id(&row), row)).collect()
}
