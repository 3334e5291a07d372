//! Layered configuration: built-in defaults, an optional TOML file, then
//! `ARCANA_`-prefixed environment variables, matching the teacher's
//! `infrastructure::config::Settings` layering convention.

use serde::Deserialize;

use crate::error::ArcanaError;

#[derive(Debug, Clone, Deserialize)]
pub struct DbSettings {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl DbSettings {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateSettings {
    pub min_delay_seconds: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestSettings {
    pub window_seconds: i64,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonSettings {
    pub interval_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogSettings {
    pub level: String,
}

/// Top-level application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub db: DbSettings,
    pub rate: RateSettings,
    pub ingest: IngestSettings,
    pub daemon: DaemonSettings,
    pub log: LogSettings,
}

impl Settings {
    /// Load defaults, then an optional TOML file, then `ARCANA_`-prefixed
    /// environment variables (nested keys via `__`, e.g.
    /// `ARCANA_DB__HOST`).
    pub fn load(config_file: Option<&str>) -> Result<Self, ArcanaError> {
        let mut builder = config::Config::builder()
            .set_default("db.host", "localhost")?
            .set_default("db.port", 5432)?
            .set_default("db.name", "arcana")?
            .set_default("db.user", "arcana")?
            .set_default("db.password", "")?
            .set_default("rate.min_delay_seconds", 0.12)?
            .set_default("ingest.window_seconds", 900)?
            .set_default("ingest.batch_size", 1000)?
            .set_default("daemon.interval_seconds", 900)?
            .set_default("log.level", "info")?;

        if let Some(path) = config_file {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("ARCANA").separator("__"))
            .build()
            .map_err(|e| ArcanaError::Input(format!("configuration error: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| ArcanaError::Input(format!("configuration error: {e}")))
    }
}

impl From<config::ConfigError> for ArcanaError {
    fn from(e: config::ConfigError) -> Self {
        ArcanaError::Input(format!("configuration error: {e}"))
    }
}
