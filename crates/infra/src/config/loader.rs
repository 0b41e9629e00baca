//! Configuration loader.
//!
//! Loads service configuration from environment variables first, falling
//! back to a TOML file probed from a few conventional locations.
//!
//! ## Environment Variables
//! - `SHOTFLOW_DB_PATH`: database file path
//! - `SHOTFLOW_DB_POOL_SIZE`: connection pool size
//! - `SHOTFLOW_SYNC_CRON`: cron expression for the periodic sync job
//! - `SHOTFLOW_SYNC_USERS`: comma-separated user emails to sync
//! - `SHOTFLOW_SYNC_CALENDAR_ID`: calendar synced per user (default `primary`)
//! - `SHOTFLOW_SYNC_ENABLED`: whether periodic sync runs (default true)
//! - `SHOTFLOW_WEBHOOK_CALLBACK_URL`: public callback URL for push channels
//! - `SHOTFLOW_WEBHOOK_SWEEP_CRON`: cron expression for the channel sweep

use std::path::{Path, PathBuf};

use shotflow_domain::{
    Config, DatabaseConfig, Result, ShotFlowError, SyncConfig, WebhookConfig,
};

const DEFAULT_SYNC_CRON: &str = "0 */15 * * * *";
const DEFAULT_SWEEP_CRON: &str = "0 0 * * * *";
const DEFAULT_CALENDAR_ID: &str = "primary";

/// Load configuration, preferring environment variables over files.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "environment configuration incomplete, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables. All required variables
/// must be present.
pub fn load_from_env() -> Result<Config> {
    let db_path = env_var("SHOTFLOW_DB_PATH")?;
    let pool_size = env_var("SHOTFLOW_DB_POOL_SIZE").and_then(|s| {
        s.parse::<u32>().map_err(|e| ShotFlowError::Config(format!("invalid pool size: {e}")))
    })?;

    let user_emails: Vec<String> = env_var("SHOTFLOW_SYNC_USERS")?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    let callback_url = env_var("SHOTFLOW_WEBHOOK_CALLBACK_URL")?;

    Ok(Config {
        database: DatabaseConfig { path: db_path, pool_size },
        sync: SyncConfig {
            cron_expression: env_or("SHOTFLOW_SYNC_CRON", DEFAULT_SYNC_CRON),
            user_emails,
            calendar_id: env_or("SHOTFLOW_SYNC_CALENDAR_ID", DEFAULT_CALENDAR_ID),
            enabled: env_bool("SHOTFLOW_SYNC_ENABLED", true),
        },
        webhook: WebhookConfig {
            callback_url,
            sweep_cron_expression: env_or("SHOTFLOW_WEBHOOK_SWEEP_CRON", DEFAULT_SWEEP_CRON),
        },
    })
}

/// Load configuration from a TOML file. When `path` is `None`, probes
/// conventional locations.
pub fn load_from_file(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => probe_config_paths().ok_or_else(|| {
            ShotFlowError::Config("no configuration file found in probed locations".into())
        })?,
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| {
        ShotFlowError::Config(format!("failed to read {}: {e}", path.display()))
    })?;

    let config: Config = toml::from_str(&contents).map_err(|e| {
        ShotFlowError::Config(format!("failed to parse {}: {e}", path.display()))
    })?;

    tracing::info!(path = %path.display(), "configuration loaded from file");
    validate(&config)?;
    Ok(config)
}

/// Check invariants not expressible in the type.
pub fn validate(config: &Config) -> Result<()> {
    if config.database.pool_size == 0 {
        return Err(ShotFlowError::Config("database pool size must be at least 1".into()));
    }
    if config.webhook.callback_url.trim().is_empty() {
        return Err(ShotFlowError::Config("webhook callback URL must not be empty".into()));
    }
    if config.sync.enabled && config.sync.user_emails.is_empty() {
        return Err(ShotFlowError::Config(
            "periodic sync is enabled but no users are configured".into(),
        ));
    }
    Ok(())
}

fn probe_config_paths() -> Option<PathBuf> {
    let candidates = ["./shotflow.toml", "./config.toml", "../shotflow.toml"];
    candidates.iter().map(PathBuf::from).find(|p| p.is_file())
}

fn env_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| ShotFlowError::Config(format!("environment variable {name} not set")))
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name).map(|v| v == "true" || v == "1").unwrap_or(default)
}
