//! Migration orchestrator - main workflow coordinator.

use crate::config::Config;
use crate::error::Result;
use crate::source::{MysqlReader, SourceReader, SourceSnapshot};
use crate::target::{DryRunTarget, PgTarget, ReferenceTable, TargetSession};
use crate::transfer::{LinkStats, RecordOutcome, ReferenceResolver, TransferEngine, TransformOptions};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Log a progress line every this many records.
const PROGRESS_INTERVAL: usize = 1_000;

/// Migration orchestrator.
pub struct Orchestrator<S, T> {
    config: Config,
    source: S,
    target: T,
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status ("completed" or "cancelled").
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Source books loaded.
    pub records_total: usize,

    /// Books committed to the catalog.
    pub records_committed: usize,

    /// Books skipped because the catalog insert was rejected.
    pub records_skipped: usize,

    /// Call numbers of skipped books.
    pub skipped_call_ids: Vec<String>,

    /// Reference rows created, per destination table.
    pub references_created: BTreeMap<ReferenceTable, u64>,

    /// Cross-reference rows created.
    pub links_created: LinkStats,

    /// Inventory rows created.
    pub inventory_created: u64,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Result of probing both databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
    pub healthy: bool,
}

impl Orchestrator<MysqlReader, PgTarget> {
    /// Connect to both databases.
    pub async fn new(config: Config) -> Result<Self> {
        let source =
            MysqlReader::new(&config.source, config.migration.get_max_mysql_connections()).await?;
        let target = PgTarget::new(&config.target, config.migration.get_max_pg_connections()).await?;
        Ok(Self::with_stores(config, source, target))
    }
}

impl Orchestrator<MysqlReader, DryRunTarget> {
    /// Connect to the source only; destination statements are logged.
    pub async fn dry_run(config: Config) -> Result<Self> {
        let source =
            MysqlReader::new(&config.source, config.migration.get_max_mysql_connections()).await?;
        Ok(Self::with_stores(config, source, DryRunTarget::new()))
    }
}

impl<S, T> Orchestrator<S, T>
where
    S: SourceReader,
    T: TargetSession,
{
    /// Build an orchestrator over already-connected stores.
    pub fn with_stores(config: Config, source: S, target: T) -> Self {
        Self {
            config,
            source,
            target,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    /// Run the migration, then close both stores.
    ///
    /// Cancellation is honored between records. Any error other than a
    /// rejected catalog insert stops the run; records committed before it
    /// stay committed.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<MigrationResult> {
        let result = self.migrate(cancel).await;

        self.source.close().await;
        self.target.close().await;

        result
    }

    async fn migrate(&mut self, cancel: CancellationToken) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!("Starting migration run: {}", run_id);

        // Phase 1: Load source
        info!("Phase 1: Loading legacy tables from {}", self.source.db_type());
        let snapshot = SourceSnapshot::load(&self.source).await?;
        let (resolver, books) = ReferenceResolver::from_snapshot(snapshot);

        let options = TransformOptions {
            language: self.config.migration.language,
            format: self.config.migration.format.clone(),
        };
        let mut engine = TransferEngine::new(resolver, options);

        // Phase 2: Transfer records
        info!(
            "Phase 2: Migrating {} books into {}",
            books.len(),
            self.target.db_type()
        );

        let mut committed = 0usize;
        let mut skipped_call_ids = Vec::new();
        let mut links_created = LinkStats::default();
        let mut inventory_created = 0u64;
        let mut cancelled = false;

        for (processed, book) in books.values().enumerate() {
            if cancel.is_cancelled() {
                info!("Cancellation requested, stopping after {} books", processed);
                cancelled = true;
                break;
            }

            match engine.execute(&mut self.target, book).await {
                Ok(RecordOutcome::Committed { links, copies, .. }) => {
                    committed += 1;
                    links_created.add(links);
                    inventory_created += copies;
                }
                Ok(RecordOutcome::Skipped) => {
                    skipped_call_ids.push(book.call_id.clone().unwrap_or_default());
                }
                Err(e) => {
                    error!("Book {} failed, aborting run: {}", book.id, e);
                    if let Err(rollback_err) = engine.abort(&mut self.target).await {
                        warn!("Rollback after failure also failed: {}", rollback_err);
                    }
                    return Err(e);
                }
            }

            if (processed + 1) % PROGRESS_INTERVAL == 0 {
                info!(
                    "Progress: {}/{} books ({} committed, {} skipped)",
                    processed + 1,
                    books.len(),
                    committed,
                    skipped_call_ids.len()
                );
            }
        }

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let result = MigrationResult {
            run_id,
            status: if cancelled { "cancelled" } else { "completed" }.to_string(),
            duration_seconds: duration,
            started_at,
            completed_at,
            records_total: books.len(),
            records_committed: committed,
            records_skipped: skipped_call_ids.len(),
            skipped_call_ids,
            references_created: engine.resolver().created(),
            links_created,
            inventory_created,
        };

        info!(
            "Migration {}: {}/{} books committed, {} skipped, {} links, {} copies in {:.1}s",
            result.status,
            result.records_committed,
            result.records_total,
            result.records_skipped,
            result.links_created.total(),
            result.inventory_created,
            result.duration_seconds
        );

        Ok(result)
    }

    /// Probe both databases.
    pub async fn health_check(&mut self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let source_result = self.source.ping().await;
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target_result = self.target.ping().await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        let result = HealthCheckResult {
            source_connected: source_result.is_ok(),
            source_latency_ms,
            source_error: source_result.err().map(|e| e.to_string()),
            target_connected: target_result.is_ok(),
            target_latency_ms,
            target_error: target_result.err().map(|e| e.to_string()),
            healthy: false,
        };

        Ok(HealthCheckResult {
            healthy: result.source_connected && result.target_connected,
            ..result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MigrationConfig, SourceConfig, TargetConfig};
    use crate::error::MigrateError;
    use crate::source::{BookRow, ReferenceRow, ReferenceSource};
    use crate::target::LinkTable;
    use crate::testing::{MemorySource, MemoryTarget};
    use crate::transfer::LanguageCode;
    use chrono::NaiveDate;

    fn config() -> Config {
        Config {
            source: SourceConfig {
                r#type: "mysql".into(),
                host: "localhost".into(),
                port: 3306,
                database: "library".into(),
                user: "root".into(),
                password: String::new(),
            },
            target: TargetConfig {
                r#type: "postgres".into(),
                host: "localhost".into(),
                port: 5432,
                database: "catalog".into(),
                user: "postgres".into(),
                password: String::new(),
                schema: "public".into(),
                ssl_mode: "disable".into(),
            },
            migration: MigrationConfig::default(),
        }
    }

    fn book(id: i64, call_id: &str) -> BookRow {
        BookRow {
            id,
            call_id: Some(call_id.into()),
            chn_name: Some(format!("書 {}", id)),
            publisher_id: Some(1),
            subject_id: Some(1),
            author_id: Some(1),
            ..Default::default()
        }
    }

    fn source() -> MemorySource {
        MemorySource::new()
            .with_reference(ReferenceSource::Publisher, ReferenceRow::new(1, "Zhonghua"))
            .with_reference(ReferenceSource::Subject, ReferenceRow::new(1, "History"))
            .with_reference(ReferenceSource::Author, ReferenceRow::new(1, "Sima Qian"))
            .with_reference(ReferenceSource::Author, ReferenceRow::new(2, "Burton Watson"))
    }

    #[tokio::test]
    async fn test_run_shares_publisher_across_books() {
        let source = source()
            .with_book(BookRow {
                published_year: Some(1998),
                qty: Some(5),
                ..book(1, "K204/1")
            })
            .with_book(BookRow {
                english_author_id: Some(1),
                translator_id: Some(2),
                ..book(2, "K204/2")
            });
        let mut orchestrator = Orchestrator::with_stores(config(), source, MemoryTarget::new());

        let result = orchestrator.run(CancellationToken::new()).await.unwrap();
        let target = orchestrator.target();

        assert_eq!(result.status, "completed");
        assert_eq!(result.records_total, 2);
        assert_eq!(result.records_committed, 2);
        assert_eq!(result.records_skipped, 0);
        assert_eq!(result.references_created[&ReferenceTable::Publisher], 1);
        assert_eq!(target.reference_inserts(ReferenceTable::Publisher), 1);

        let catalog = target.catalog();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog[0].1.publisher_id, catalog[1].1.publisher_id);
        assert_eq!(catalog[0].1.publish_date, NaiveDate::from_ymd_opt(1998, 1, 1));
        assert_eq!(catalog[1].1.publish_date, None);
        assert_eq!(catalog[0].1.language, LanguageCode::Traditional);

        // Book 2: english author equals primary author, so one author link.
        assert_eq!(target.links(LinkTable::Authors).len(), 2);
        assert_eq!(target.links(LinkTable::Translators).len(), 1);
        assert_eq!(result.links_created.total(), 5);

        let copies: Vec<i64> = target.inventory().iter().map(|(_, seq)| *seq).collect();
        assert_eq!(copies, vec![1, 2, 3, 4, 5]);
        assert_eq!(result.inventory_created, 5);
    }

    #[tokio::test]
    async fn test_run_skips_duplicate_and_continues() {
        let source = source()
            .with_book(BookRow {
                qty: Some(2),
                ..book(1, "DUP")
            })
            .with_book(book(2, "NEW"));
        let target = MemoryTarget::new().with_existing_call_id("DUP");
        let mut orchestrator = Orchestrator::with_stores(config(), source, target);

        let result = orchestrator.run(CancellationToken::new()).await.unwrap();
        let target = orchestrator.target();

        assert_eq!(result.records_committed, 1);
        assert_eq!(result.records_skipped, 1);
        assert_eq!(result.skipped_call_ids, vec!["DUP".to_string()]);
        assert!(target.inventory().is_empty());
        assert_eq!(target.catalog().len(), 1);
        let catalog_id = target.catalog()[0].0;
        assert!(target
            .links(LinkTable::Subjects)
            .iter()
            .all(|(id, _)| *id == catalog_id));
        assert_eq!(target.committed_references(ReferenceTable::Publisher), 1);
    }

    #[tokio::test]
    async fn test_run_uses_configured_language_and_format() {
        let mut config = config();
        config.migration.language = LanguageCode::Simplified;
        config.migration.format = "periodical".into();
        let source = source().with_book(book(1, "Z1"));
        let mut orchestrator = Orchestrator::with_stores(config, source, MemoryTarget::new());

        orchestrator.run(CancellationToken::new()).await.unwrap();

        let record = &orchestrator.target().catalog()[0].1;
        assert_eq!(record.language, LanguageCode::Simplified);
        assert_eq!(record.format, "periodical");
    }

    #[tokio::test]
    async fn test_run_fails_fatally_on_store_error() {
        let source = source()
            .with_book(BookRow {
                qty: None,
                subject_id: None,
                author_id: None,
                ..book(1, "OK")
            })
            .with_book(book(2, "BROKEN"));
        let target = MemoryTarget::new().failing_links();
        let mut orchestrator = Orchestrator::with_stores(config(), source, target);

        let err = orchestrator.run(CancellationToken::new()).await.unwrap_err();
        let target = orchestrator.target();

        assert!(matches!(err, MigrateError::Pool { .. }));
        assert!(!target.in_transaction());
        let call_ids: Vec<_> = target
            .catalog()
            .into_iter()
            .filter_map(|(_, r)| r.call_id)
            .collect();
        assert_eq!(call_ids, vec!["OK".to_string()]);
    }

    #[tokio::test]
    async fn test_run_stops_on_fatal_catalog_error() {
        let source = source()
            .with_book(book(1, "OK"))
            .with_book(BookRow {
                qty: Some(3),
                ..book(2, "FAILS")
            })
            .with_book(book(3, "LATER"));
        let target = MemoryTarget::new().failing_catalog("FAILS");
        let mut orchestrator = Orchestrator::with_stores(config(), source, target);

        let err = orchestrator.run(CancellationToken::new()).await.unwrap_err();
        let target = orchestrator.target();

        assert!(matches!(err, MigrateError::Pool { .. }));
        assert!(!target.in_transaction());
        let call_ids: Vec<_> = target
            .catalog()
            .into_iter()
            .filter_map(|(_, r)| r.call_id)
            .collect();
        assert_eq!(call_ids, vec!["OK".to_string()]);
        let catalog_id = target.catalog()[0].0;
        assert!(target.inventory().is_empty());
        assert!(target
            .links(LinkTable::Subjects)
            .iter()
            .all(|(id, _)| *id == catalog_id));
        assert_eq!(target.committed_references(ReferenceTable::Publisher), 1);
    }

    #[tokio::test]
    async fn test_run_closes_stores_after_failure() {
        let source = source().with_book(book(1, "FAILS"));
        let target = MemoryTarget::new().failing_catalog("FAILS");
        let mut orchestrator = Orchestrator::with_stores(config(), source, target);

        assert!(orchestrator.run(CancellationToken::new()).await.is_err());

        assert!(orchestrator.source().is_closed());
        assert!(orchestrator.target().is_closed());
    }

    #[tokio::test]
    async fn test_run_closes_stores_after_success() {
        let source = source().with_book(book(1, "A"));
        let mut orchestrator = Orchestrator::with_stores(config(), source, MemoryTarget::new());

        orchestrator.run(CancellationToken::new()).await.unwrap();

        assert!(orchestrator.source().is_closed());
        assert!(orchestrator.target().is_closed());
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let source = source().with_book(book(1, "A")).with_book(book(2, "B"));
        let mut orchestrator = Orchestrator::with_stores(config(), source, MemoryTarget::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = orchestrator.run(cancel).await.unwrap();

        assert_eq!(result.status, "cancelled");
        assert_eq!(result.records_committed, 0);
        assert!(orchestrator.target().catalog().is_empty());
    }

    #[tokio::test]
    async fn test_run_propagates_schema_mismatch() {
        let source = source().failing_on(ReferenceSource::Subject);
        let mut orchestrator = Orchestrator::with_stores(config(), source, MemoryTarget::new());

        let err = orchestrator.run(CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, MigrateError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut orchestrator =
            Orchestrator::with_stores(config(), MemorySource::new(), MemoryTarget::new());

        let result = orchestrator.health_check().await.unwrap();

        assert!(result.healthy);
        assert!(result.source_error.is_none());
    }

    #[test]
    fn test_result_serializes_reference_counts() {
        let result = MigrationResult {
            run_id: "r".into(),
            status: "completed".into(),
            duration_seconds: 0.5,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            records_total: 1,
            records_committed: 1,
            records_skipped: 0,
            skipped_call_ids: vec![],
            references_created: BTreeMap::from([(ReferenceTable::Translator, 3)]),
            links_created: LinkStats::default(),
            inventory_created: 0,
        };

        let json = result.to_json().unwrap();
        assert!(json.contains("\"translator\": 3"));
    }
}
