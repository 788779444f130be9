use std::env;
use std::path::PathBuf;
use std::time::Duration;

use iamgraph_application::{
    DEFAULT_HEARTBEAT_INTERVAL, ImportSettings, ImportSource, UnknownRecordKindPolicy,
};
use iamgraph_core::{AppError, AppResult};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImporterCommand {
    Import,
    Migrate,
    Sweep,
}

impl ImporterCommand {
    fn parse(argument: Option<&str>) -> AppResult<Self> {
        match argument {
            None => Ok(Self::Import),
            Some("migrate") => Ok(Self::Migrate),
            Some("sweep") => Ok(Self::Sweep),
            Some(other) => Err(AppError::Validation(format!(
                "unknown command '{other}', expected 'migrate' or 'sweep'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImporterConfig {
    pub command: ImporterCommand,
    pub database_url: String,
    pub source: ImportSource,
    pub inventory_path: Option<PathBuf>,
    pub permissions_path: Option<PathBuf>,
    pub heartbeat_interval: Duration,
    pub unknown_kind_policy: UnknownRecordKindPolicy,
    pub stale_after: Duration,
}

impl ImporterConfig {
    pub fn load() -> AppResult<Self> {
        let command = ImporterCommand::parse(env::args().nth(1).as_deref())?;

        let database_url = required_env("DATABASE_URL")?;
        let source = match optional_env("IMPORT_SOURCE") {
            Some(value) => ImportSource::parse(value.as_str())?,
            None => ImportSource::Forseti,
        };
        let inventory_path = optional_env("IMPORT_INVENTORY_PATH").map(PathBuf::from);
        let permissions_path = optional_env("IMPORT_PERMISSIONS_PATH").map(PathBuf::from);
        let heartbeat_interval_seconds = parse_env_u64(
            "IMPORT_HEARTBEAT_INTERVAL_SECONDS",
            DEFAULT_HEARTBEAT_INTERVAL.as_secs(),
        )?;
        let unknown_kind_policy = match optional_env("IMPORT_UNKNOWN_KIND_POLICY") {
            Some(value) => UnknownRecordKindPolicy::parse(value.as_str())?,
            None => UnknownRecordKindPolicy::default(),
        };
        let stale_after_seconds = parse_env_u64("IMPORT_STALE_AFTER_SECONDS", 120)?;

        if heartbeat_interval_seconds == 0 {
            return Err(AppError::Validation(
                "IMPORT_HEARTBEAT_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if stale_after_seconds == 0 {
            return Err(AppError::Validation(
                "IMPORT_STALE_AFTER_SECONDS must be greater than zero".to_owned(),
            ));
        }

        if command == ImporterCommand::Import
            && source == ImportSource::Forseti
            && inventory_path.is_none()
        {
            return Err(AppError::Validation(
                "IMPORT_INVENTORY_PATH is required when IMPORT_SOURCE is FORSETI".to_owned(),
            ));
        }

        Ok(Self {
            command,
            database_url,
            source,
            inventory_path,
            permissions_path,
            heartbeat_interval: Duration::from_secs(heartbeat_interval_seconds),
            unknown_kind_policy,
            stale_after: Duration::from_secs(stale_after_seconds),
        })
    }

    pub fn settings(&self) -> ImportSettings {
        ImportSettings {
            heartbeat_interval: self.heartbeat_interval,
            unknown_kind_policy: self.unknown_kind_policy,
        }
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn optional_env(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match optional_env(name) {
        Some(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        None => Ok(default),
    }
}
