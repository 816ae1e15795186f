//! MySQL/MariaDB reader for the legacy catalog.
//!
//! Uses SQLx for connection pooling. Every column is cast in SQL so that
//! integer ids decode as `BIGINT` and text decodes as `CHAR` regardless of
//! the legacy column definitions.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow, MySqlSslMode};
use sqlx::Row;
use tracing::{debug, info};

use super::types::{key_by_id, BookRow, ReferenceRow, ReferenceSource, SourceTable, BOOK_TABLE};
use super::SourceReader;
use crate::config::SourceConfig;
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLSTATE for "Unknown column".
const UNKNOWN_COLUMN: &str = "42S22";

const REFERENCE_INT_COLUMNS: &[&str] = &["ID"];
const REFERENCE_TEXT_COLUMNS: &[&str] = &["NAME"];

const BOOK_INT_COLUMNS: &[&str] = &[
    "ID",
    "PUBLISHED_YEAR",
    "PUBLISHER_ID",
    "SUBJECT_ID",
    "AUTHOR_ID",
    "ENGLISH_AUTHOR_ID",
    "TRANSLATOR_ID",
    "QTY",
];
const BOOK_TEXT_COLUMNS: &[&str] = &["CALL_ID", "CHN_NAME", "ENG_NAME", "EDITION"];

/// MySQL/MariaDB source reader implementation.
pub struct MysqlReader {
    pool: MySqlPool,
}

impl MysqlReader {
    /// Connect to the legacy database.
    ///
    /// Any failure here is reported as [`MigrateError::SourceUnavailable`].
    pub async fn new(config: &SourceConfig, max_conns: usize) -> Result<Self> {
        let options = MySqlConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .ssl_mode(MySqlSslMode::Preferred);

        let unavailable =
            |e: sqlx::Error| MigrateError::SourceUnavailable(format!("{}: {}", config.display_url(), e));

        let pool = MySqlPoolOptions::new()
            .max_connections(max_conns as u32)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        // Test connection
        sqlx::query("SELECT 1")
            .fetch_one(&pool)
            .await
            .map_err(unavailable)?;

        info!("Connected to MySQL source: {}", config.display_url());

        Ok(Self { pool })
    }

    /// Read every row of `table` with the given columns cast and aliased.
    async fn fetch_table(
        &self,
        table: &str,
        int_columns: &[&str],
        text_columns: &[&str],
    ) -> Result<Vec<MySqlRow>> {
        let query = build_select(table, int_columns, text_columns);
        debug!("Reading source table {}: {}", table, query);

        sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_query_error(table, e))
    }
}

#[async_trait]
impl SourceReader for MysqlReader {
    async fn load_references(&self, source: ReferenceSource) -> Result<SourceTable<ReferenceRow>> {
        let table = source.table_name();
        let rows = self
            .fetch_table(table, REFERENCE_INT_COLUMNS, REFERENCE_TEXT_COLUMNS)
            .await?;

        let records = rows
            .iter()
            .map(|row| {
                Ok(ReferenceRow {
                    id: required_id(row, table)?,
                    name: text(row, table, "NAME")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Loaded {} rows from {}", records.len(), table);
        Ok(key_by_id(records, |r| r.id))
    }

    async fn load_books(&self) -> Result<SourceTable<BookRow>> {
        let rows = self
            .fetch_table(BOOK_TABLE, BOOK_INT_COLUMNS, BOOK_TEXT_COLUMNS)
            .await?;

        let records = rows
            .iter()
            .map(|row| {
                Ok(BookRow {
                    id: required_id(row, BOOK_TABLE)?,
                    call_id: text(row, BOOK_TABLE, "CALL_ID")?,
                    chn_name: text(row, BOOK_TABLE, "CHN_NAME")?,
                    eng_name: text(row, BOOK_TABLE, "ENG_NAME")?,
                    edition: text(row, BOOK_TABLE, "EDITION")?,
                    published_year: int(row, BOOK_TABLE, "PUBLISHED_YEAR")?,
                    publisher_id: int(row, BOOK_TABLE, "PUBLISHER_ID")?,
                    subject_id: int(row, BOOK_TABLE, "SUBJECT_ID")?,
                    author_id: int(row, BOOK_TABLE, "AUTHOR_ID")?,
                    english_author_id: int(row, BOOK_TABLE, "ENGLISH_AUTHOR_ID")?,
                    translator_id: int(row, BOOK_TABLE, "TRANSLATOR_ID")?,
                    qty: int(row, BOOK_TABLE, "QTY")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("Loaded {} rows from {}", records.len(), BOOK_TABLE);
        Ok(key_by_id(records, |r| r.id))
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mysql"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Build the SELECT for a legacy table.
fn build_select(table: &str, int_columns: &[&str], text_columns: &[&str]) -> String {
    let casts: Vec<String> = int_columns
        .iter()
        .map(|c| format!("CAST({col} AS SIGNED) AS {col}", col = quote_ident(c)))
        .chain(
            text_columns
                .iter()
                .map(|c| format!("CAST({col} AS CHAR) AS {col}", col = quote_ident(c))),
        )
        .collect();

    format!("SELECT {} FROM {}", casts.join(", "), quote_ident(table))
}

/// Quote a MySQL identifier.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Translate an unknown-column error into a schema mismatch.
fn map_query_error(table: &str, e: sqlx::Error) -> MigrateError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(UNKNOWN_COLUMN) {
            let column = unknown_column_name(db.message()).unwrap_or("?");
            return MigrateError::schema_mismatch(table, column);
        }
    }
    MigrateError::Source(e)
}

/// Extract `X` from MySQL's "Unknown column 'X' in 'field list'".
fn unknown_column_name(message: &str) -> Option<&str> {
    let start = message.find('\'')? + 1;
    let len = message[start..].find('\'')?;
    Some(&message[start..start + len])
}

fn required_id(row: &MySqlRow, table: &str) -> Result<i64> {
    int(row, table, "ID")?.ok_or_else(|| MigrateError::schema_mismatch(table, "ID"))
}

fn int(row: &MySqlRow, table: &str, column: &str) -> Result<Option<i64>> {
    row.try_get::<Option<i64>, _>(column)
        .map_err(|e| decode_error(table, column, e))
}

fn text(row: &MySqlRow, table: &str, column: &str) -> Result<Option<String>> {
    row.try_get::<Option<String>, _>(column)
        .map_err(|e| decode_error(table, column, e))
}

fn decode_error(table: &str, column: &str, e: sqlx::Error) -> MigrateError {
    match e {
        sqlx::Error::ColumnNotFound(_) => MigrateError::schema_mismatch(table, column),
        other => MigrateError::Source(other),
    }
}
