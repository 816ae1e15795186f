//! Mapping of a legacy book row onto a catalog row.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MigrateError;
use crate::source::BookRow;
use crate::target::CatalogRecord;

/// Language tag stored in `catalog.lang`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LanguageCode {
    /// Traditional Chinese.
    #[default]
    #[serde(rename = "tc")]
    Traditional,
    /// Simplified Chinese.
    #[serde(rename = "sc")]
    Simplified,
    /// Chinese, script unspecified.
    #[serde(rename = "cn")]
    Chinese,
}

impl LanguageCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageCode::Traditional => "tc",
            LanguageCode::Simplified => "sc",
            LanguageCode::Chinese => "cn",
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageCode {
    type Err = MigrateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tc" => Ok(LanguageCode::Traditional),
            "sc" => Ok(LanguageCode::Simplified),
            "cn" => Ok(LanguageCode::Chinese),
            other => Err(MigrateError::Config(format!(
                "Invalid language '{}'. Valid values: tc, sc, cn",
                other
            ))),
        }
    }
}

/// Publishing cities whose output is in simplified script.
const SIMPLIFIED_CITIES: &[&str] = &["上海", "江蘇", "北京", "中國南京", "南京", "浙江", "深圳市"];

/// Guess the script of a book from its publishing city.
///
/// Not consulted by the migration, which writes the configured language on
/// every row.
pub fn language_for_city(city: &str) -> LanguageCode {
    if SIMPLIFIED_CITIES.contains(&city) {
        LanguageCode::Simplified
    } else {
        LanguageCode::Chinese
    }
}

/// Double every single quote so `s` can sit inside a SQL string literal.
///
/// Only used to render statements for display; real statements bind values
/// as parameters.
pub fn escape_literal(s: &str) -> String {
    s.replace('\'', "''")
}

/// January 1st of `year`, or `None` when the year is missing or not positive.
pub fn publish_date(year: Option<i64>) -> Option<NaiveDate> {
    let year = year.filter(|y| *y > 0)?;
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, 1, 1)
}

/// Fixed values written on every migrated catalog row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOptions {
    pub language: LanguageCode,
    pub format: String,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            language: LanguageCode::Traditional,
            format: "book".to_string(),
        }
    }
}

/// Build the catalog row for `book`.
///
/// `publisher_id` is the already-resolved destination publisher, if any.
pub fn transform(
    book: &BookRow,
    publisher_id: Option<i64>,
    options: &TransformOptions,
) -> CatalogRecord {
    CatalogRecord {
        call_id: book.call_id.clone(),
        name: book.chn_name.clone(),
        alt_name: book.eng_name.clone(),
        edition: book.edition.clone(),
        language: options.language,
        format: options.format.clone(),
        publish_date: publish_date(book.published_year),
        publisher_id,
    }
}
