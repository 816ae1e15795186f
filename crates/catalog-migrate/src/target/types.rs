//! Destination row shapes and table identifiers.

use crate::transfer::LanguageCode;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Destination reference tables (each has `name` plus audit columns).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceTable {
    Publisher,
    Subject,
    Author,
    Translator,
}

impl ReferenceTable {
    pub const ALL: [ReferenceTable; 4] = [
        ReferenceTable::Publisher,
        ReferenceTable::Subject,
        ReferenceTable::Author,
        ReferenceTable::Translator,
    ];

    pub fn table_name(&self) -> &'static str {
        match self {
            ReferenceTable::Publisher => "publisher",
            ReferenceTable::Subject => "subject",
            ReferenceTable::Author => "author",
            ReferenceTable::Translator => "translator",
        }
    }
}

/// Catalog cross-reference tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkTable {
    Subjects,
    Authors,
    Translators,
}

impl LinkTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            LinkTable::Subjects => "catalog_subjects",
            LinkTable::Authors => "catalog_authors",
            LinkTable::Translators => "catalog_translators",
        }
    }

    /// Column holding the referenced entity id.
    pub fn entity_column(&self) -> &'static str {
        match self {
            LinkTable::Subjects => "subject_id",
            LinkTable::Authors => "author_id",
            LinkTable::Translators => "translator_id",
        }
    }
}

/// Destination `catalog` table name.
pub const CATALOG_TABLE: &str = "catalog";

/// Destination `inventory` table name.
pub const INVENTORY_TABLE: &str = "inventory";

/// One normalized `catalog` row, ready to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub call_id: Option<String>,
    pub name: Option<String>,
    pub alt_name: Option<String>,
    pub edition: Option<String>,
    pub language: LanguageCode,
    pub format: String,
    pub publish_date: Option<NaiveDate>,
    pub publisher_id: Option<i64>,
}
