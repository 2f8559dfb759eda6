use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Maintenance configuration loaded from environment variables.
///
/// | Env Var              | Default      |
/// |----------------------|--------------|
/// | `CMS_DATABASE_PATH`  | `cms.sqlite` |
/// | `CMS_KEEP_SNAPSHOTS` | `5`          |
/// | `CMS_LOG`            | `info`       |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// SQLite database holding sites, pages and snapshots
    pub database_path: PathBuf,
    /// Snapshots kept per page by the cleanup run
    pub keep_snapshots: usize,
    /// `tracing` filter directive
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from("cms.sqlite"),
            keep_snapshots: 5,
            log_filter: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from any variable lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = AppConfig::default();

        let database_path = lookup("CMS_DATABASE_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let keep_snapshots = match lookup("CMS_KEEP_SNAPSHOTS") {
            Some(value) => match value.trim().parse() {
                Ok(keep) => keep,
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        var: "CMS_KEEP_SNAPSHOTS",
                        value,
                    })
                }
            },
            None => defaults.keep_snapshots,
        };

        let log_filter = lookup("CMS_LOG")
            .filter(|value| !value.trim().is_empty())
            .unwrap_or(defaults.log_filter);

        Ok(AppConfig {
            database_path,
            keep_snapshots,
            log_filter,
        })
    }
}
