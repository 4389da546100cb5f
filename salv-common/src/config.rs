//! Engine configuration loading and resolution
//!
//! Resolution priority for every setting:
//! 1. Environment variable (`SALV_*`)
//! 2. TOML config file (path from CLI arg or `SALV_CONFIG`)
//! 3. Compiled default

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::Deserialize;

use crate::{time, Error, Result};

/// Default org operating timezone for wall-clock scheduling decisions
pub const DEFAULT_TIMEZONE: &str = "America/Argentina/Buenos_Aires";

/// Runtime configuration for the scheduler daemon
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// SQLite database file path
    pub database_path: PathBuf,
    /// Eligibility promotion sweep interval
    pub eligibility_interval_minutes: u64,
    /// Nightly sweep wall-clock fire time ("HH:MM" in `timezone`)
    pub nightly_fire_time: String,
    /// Follow-up stall check interval
    pub follow_up_interval_minutes: u64,
    /// Hours an audit may sit in a needs-attention status before escalation
    pub follow_up_sla_hours: i64,
    /// IANA timezone identifier for nightly/month-boundary computations
    pub timezone: String,
    /// Notification webhook endpoint; when unset, dispatches are logged only
    pub notify_endpoint: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("salv.db"),
            eligibility_interval_minutes: 5,
            nightly_fire_time: "23:01".to_string(),
            follow_up_interval_minutes: 60,
            follow_up_sla_hours: 12,
            timezone: DEFAULT_TIMEZONE.to_string(),
            notify_endpoint: None,
        }
    }
}

/// TOML file shape; every field optional so partial files merge over defaults
#[derive(Debug, Default, Deserialize)]
struct TomlConfig {
    database_path: Option<PathBuf>,
    eligibility_interval_minutes: Option<u64>,
    nightly_fire_time: Option<String>,
    follow_up_interval_minutes: Option<u64>,
    follow_up_sla_hours: Option<i64>,
    timezone: Option<String>,
    notify_endpoint: Option<String>,
}

impl EngineConfig {
    /// Resolve configuration from CLI config path, environment, and defaults
    pub fn resolve(cli_config_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let file_path = cli_config_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("SALV_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = file_path {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
            })?;
            let toml_config: TomlConfig = toml::from_str(&contents)
                .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
            config.merge_toml(toml_config);
        }

        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parsed org timezone
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse()
            .map_err(|_| Error::Config(format!("Unknown timezone '{}'", self.timezone)))
    }

    /// Parsed nightly fire time as (hour, minute)
    pub fn nightly_fire(&self) -> Result<(u32, u32)> {
        time::parse_fire_time(&self.nightly_fire_time)
    }

    fn merge_toml(&mut self, toml_config: TomlConfig) {
        if let Some(v) = toml_config.database_path {
            self.database_path = v;
        }
        if let Some(v) = toml_config.eligibility_interval_minutes {
            self.eligibility_interval_minutes = v;
        }
        if let Some(v) = toml_config.nightly_fire_time {
            self.nightly_fire_time = v;
        }
        if let Some(v) = toml_config.follow_up_interval_minutes {
            self.follow_up_interval_minutes = v;
        }
        if let Some(v) = toml_config.follow_up_sla_hours {
            self.follow_up_sla_hours = v;
        }
        if let Some(v) = toml_config.timezone {
            self.timezone = v;
        }
        if let Some(v) = toml_config.notify_endpoint {
            self.notify_endpoint = Some(v);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("SALV_DB_PATH") {
            self.database_path = PathBuf::from(v);
        }
        if let Some(v) = env_u64("SALV_ELIGIBILITY_INTERVAL_MINUTES")? {
            self.eligibility_interval_minutes = v;
        }
        if let Ok(v) = std::env::var("SALV_NIGHTLY_FIRE_TIME") {
            self.nightly_fire_time = v;
        }
        if let Some(v) = env_u64("SALV_FOLLOW_UP_INTERVAL_MINUTES")? {
            self.follow_up_interval_minutes = v;
        }
        if let Some(v) = env_u64("SALV_FOLLOW_UP_SLA_HOURS")? {
            self.follow_up_sla_hours = v as i64;
        }
        if let Ok(v) = std::env::var("SALV_TIMEZONE") {
            self.timezone = v;
        }
        if let Ok(v) = std::env::var("SALV_NOTIFY_ENDPOINT") {
            self.notify_endpoint = Some(v);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.eligibility_interval_minutes == 0 || self.follow_up_interval_minutes == 0 {
            return Err(Error::Config("Scheduler intervals must be non-zero".to_string()));
        }
        if self.follow_up_sla_hours <= 0 {
            return Err(Error::Config("Follow-up SLA must be positive".to_string()));
        }
        self.tz()?;
        self.nightly_fire()?;
        Ok(())
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(v) => v
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} must be an integer, got '{}'", name, v))),
        Err(_) => Ok(None),
    }
}
