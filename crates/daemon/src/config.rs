//! Layered daemon configuration: built-in defaults, optionally overlaid
//! by a config file, then by environment variables.
//!
//! The legacy `ORCHESTRA_*` / `DB_ADAPTER_SCHEMA_CACHE_SIZE` env var
//! names are accepted as aliases for the corresponding keys so operators
//! migrating an existing deployment don't have to touch their
//! environment (see DESIGN.md).

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 9527;
const DEFAULT_POOL_SIZE: usize = 4;
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_LOG_FORMAT: &str = "pretty";

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Number of workers in the pool.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `"pretty"` or `"json"`.
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Schema-cache-sized hint honoring the legacy
    /// `DB_ADAPTER_SCHEMA_CACHE_SIZE` env var; sized the sqlx pool's max
    /// connections alongside `infra-sqlite`'s own `FOREMAN_POOL_SIZE`
    /// (see DESIGN.md - the two knobs are kept distinct rather than
    /// merged since they address different layers).
    #[serde(default = "default_schema_cache_size")]
    pub schema_cache_size: u32,
}

fn default_db_path() -> String {
    directories::ProjectDirs::from("", "", "foreman")
        .map(|dirs| {
            dirs.data_dir()
                .join("foreman.db")
                .to_string_lossy()
                .into_owned()
        })
        .unwrap_or_else(|| "./foreman.db".to_string())
}
fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_log_format() -> String {
    DEFAULT_LOG_FORMAT.to_string()
}
fn default_schema_cache_size() -> u32 {
    20
}

impl DaemonConfig {
    /// Loads defaults, then `config_path` (if it exists), then
    /// environment variables prefixed `FOREMAN_` (e.g. `FOREMAN_PORT`),
    /// then the legacy aliases below - in ascending precedence.
    pub fn load(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())?
            .set_default("host", default_host())?
            .set_default("port", default_port() as i64)?
            .set_default("pool_size", default_pool_size() as i64)?
            .set_default("log_level", default_log_level())?
            .set_default("log_format", default_log_format())?
            .set_default("schema_cache_size", default_schema_cache_size() as i64)?;

        if let Some(path) = config_path {
            if path.exists() {
                builder = builder.add_source(File::from(path));
            }
        } else {
            builder = builder.add_source(File::with_name("foreman").required(false));
        }

        builder = builder.add_source(Environment::with_prefix("FOREMAN").separator("_"));

        let mut config: DaemonConfig = builder.build()?.try_deserialize()?;
        apply_legacy_env_aliases(&mut config);
        Ok(config)
    }
}

/// Overlays a handful of legacy environment variable names, highest
/// precedence of all (an operator setting one of these clearly intends
/// it to win).
fn apply_legacy_env_aliases(config: &mut DaemonConfig) {
    if let Ok(level) = std::env::var("ORCHESTRA_LOGLEVEL") {
        config.log_level = level;
    }
    if let Ok(prefix) = std::env::var("ORCHESTRA_LOGPREFIX") {
        tracing::debug!(prefix = %prefix, "ORCHESTRA_LOGPREFIX is accepted but unused: this implementation tags every log line with its span, not a static prefix");
    }
    if let Ok(size) = std::env::var("DB_ADAPTER_SCHEMA_CACHE_SIZE") {
        if let Ok(size) = size.parse() {
            config.schema_cache_size = size;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_with_no_sources() {
        std::env::remove_var("FOREMAN_PORT");
        let config = DaemonConfig::load(Some(PathBuf::from("/nonexistent/path.toml"))).unwrap();
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
    }

    #[test]
    fn legacy_env_alias_overrides_default_log_level() {
        std::env::set_var("ORCHESTRA_LOGLEVEL", "debug");
        let config = DaemonConfig::load(Some(PathBuf::from("/nonexistent/path.toml"))).unwrap();
        assert_eq!(config.log_level, "debug");
        std::env::remove_var("ORCHESTRA_LOGLEVEL");
    }
}
