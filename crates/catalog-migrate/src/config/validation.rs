//! Configuration validation.

use super::Config;
use crate::error::{MigrateError, Result};
use crate::target::SslMode;

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.host.is_empty() {
        return Err(MigrateError::Config("source.host is required".into()));
    }
    if config.source.database.is_empty() {
        return Err(MigrateError::Config("source.database is required".into()));
    }
    if config.source.user.is_empty() {
        return Err(MigrateError::Config("source.user is required".into()));
    }
    if config.source.r#type != "mysql" {
        return Err(MigrateError::Config(format!(
            "source.type must be 'mysql', got '{}'",
            config.source.r#type
        )));
    }

    // Target validation
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    if config.target.schema.is_empty() {
        return Err(MigrateError::Config("target.schema is required".into()));
    }
    if config.target.r#type != "postgres" {
        return Err(MigrateError::Config(format!(
            "target.type must be 'postgres', got '{}'",
            config.target.r#type
        )));
    }
    SslMode::parse(&config.target.ssl_mode)?;

    // Migration config validation
    if config.migration.format.trim().is_empty() {
        return Err(MigrateError::Config(
            "migration.format must not be empty".into(),
        ));
    }
    if let Some(0) = config.migration.max_mysql_connections {
        return Err(MigrateError::Config(
            "migration.max_mysql_connections must be at least 1".into(),
        ));
    }
    if let Some(0) = config.migration.max_pg_connections {
        return Err(MigrateError::Config(
            "migration.max_pg_connections must be at least 1".into(),
        ));
    }

    Ok(())
}
