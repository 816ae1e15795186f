//! PostgreSQL destination session.
//!
//! Uses deadpool-postgres for the connection and holds a single pooled client
//! for the lifetime of the run, so explicit `BEGIN`/`COMMIT` statements bracket
//! each source record.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio_postgres::error::SqlState;
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info, warn};

use super::tls::SslMode;
use super::types::{CatalogRecord, LinkTable, ReferenceTable, CATALOG_TABLE, INVENTORY_TABLE};
use super::TargetSession;
use crate::config::TargetConfig;
use crate::error::{MigrateError, Result};

/// Connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLSTATE class for integrity constraint violations.
const INTEGRITY_VIOLATION_CLASS: &str = "23";

/// PostgreSQL target session.
pub struct PgTarget {
    pool: Pool,
    client: Object,
    schema: String,
}

impl PgTarget {
    /// Connect to the destination database.
    ///
    /// Any failure here is reported as [`MigrateError::TargetUnavailable`].
    pub async fn new(config: &TargetConfig, max_conns: usize) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);

        // Connection options for reliability
        pg_config.keepalives(true);
        pg_config.keepalives_idle(Duration::from_secs(30));
        pg_config.connect_timeout(CONNECT_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let mgr = match SslMode::parse(&config.ssl_mode)?.connector()? {
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
            None => {
                warn!("PostgreSQL TLS is disabled. Credentials will be transmitted in plaintext.");
                Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config)
            }
        };

        let pool = Pool::builder(mgr)
            .max_size(max_conns)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?;

        let client = pool.get().await.map_err(|e| {
            MigrateError::TargetUnavailable(format!("{}: {}", config.display_url(), e))
        })?;
        client.simple_query("SELECT 1").await.map_err(|e| {
            MigrateError::TargetUnavailable(format!("{}: {}", config.display_url(), e))
        })?;

        info!("Connected to PostgreSQL target: {}", config.display_url());

        Ok(Self {
            pool,
            client,
            schema: config.schema.clone(),
        })
    }

    /// Qualify a table name with the target schema.
    fn qualify(&self, table: &str) -> String {
        qualify_table(&self.schema, table)
    }
}

#[async_trait]
impl TargetSession for PgTarget {
    async fn begin(&mut self) -> Result<()> {
        self.client.batch_execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.client.batch_execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.client.batch_execute("ROLLBACK").await?;
        Ok(())
    }

    async fn insert_reference(&mut self, table: ReferenceTable, name: &str) -> Result<i64> {
        let sql = reference_insert_sql(&self.qualify(table.table_name()));
        let stmt = self.client.prepare_cached(&sql).await?;
        let row = self.client.query_one(&stmt, &[&name]).await?;
        let id: i64 = row.try_get(0)?;
        debug!("Inserted {} {} ({})", table.table_name(), id, name);
        Ok(id)
    }

    async fn insert_catalog(&mut self, record: &CatalogRecord) -> Result<Option<i64>> {
        let sql = catalog_insert_sql(&self.qualify(CATALOG_TABLE));
        let stmt = self.client.prepare_cached(&sql).await?;
        let result = self
            .client
            .query_one(
                &stmt,
                &[
                    &record.call_id,
                    &record.name,
                    &record.alt_name,
                    &record.edition,
                    &record.language.as_str(),
                    &record.format,
                    &record.publish_date,
                    &record.publisher_id,
                ],
            )
            .await;

        match result {
            Ok(row) => Ok(Some(row.try_get(0)?)),
            Err(e) if is_integrity_violation(&e) => {
                debug!(
                    "Catalog insert for {:?} rejected: {}",
                    record.call_id, e
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn insert_link(&mut self, link: LinkTable, catalog_id: i64, entity_id: i64) -> Result<()> {
        let sql = link_insert_sql(&self.qualify(link.table_name()), link.entity_column());
        let stmt = self.client.prepare_cached(&sql).await?;
        self.client
            .execute(&stmt, &[&catalog_id, &entity_id])
            .await?;
        Ok(())
    }

    async fn insert_inventory(&mut self, catalog_id: i64, copy_seq: i64) -> Result<()> {
        let sql = inventory_insert_sql(&self.qualify(INVENTORY_TABLE));
        let stmt = self.client.prepare_cached(&sql).await?;
        self.client
            .execute(&stmt, &[&catalog_id, &copy_seq])
            .await?;
        Ok(())
    }

    async fn ping(&mut self) -> Result<()> {
        self.client.simple_query("SELECT 1").await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&mut self) {
        self.pool.close();
    }
}

/// Whether a PostgreSQL error is an integrity constraint violation.
fn is_integrity_violation(e: &tokio_postgres::Error) -> bool {
    e.code().map(is_integrity_state).unwrap_or(false)
}

/// Whether `state` belongs to SQLSTATE class 23.
fn is_integrity_state(state: &SqlState) -> bool {
    state.code().starts_with(INTEGRITY_VIOLATION_CLASS)
}

/// Quote a PostgreSQL identifier.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Qualify a table name with schema.
fn qualify_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

fn reference_insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (name, inserted_at, updated_at) VALUES ($1, now(), now()) RETURNING id::bigint",
        table
    )
}

fn catalog_insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (call_id, name, alt_name, edition, lang, format, publish_date, publisher_id, \
         inserted_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7::date, $8::bigint, now(), now()) RETURNING id::bigint",
        table
    )
}

fn link_insert_sql(table: &str, entity_column: &str) -> String {
    format!(
        "INSERT INTO {} (catalog_id, {}) VALUES ($1::bigint, $2::bigint)",
        table,
        quote_ident(entity_column)
    )
}

fn inventory_insert_sql(table: &str) -> String {
    format!(
        "INSERT INTO {} (catalog_id, copy_seq, inserted_at, updated_at) \
         VALUES ($1::bigint, $2::bigint, now(), now())",
        table
    )
}
