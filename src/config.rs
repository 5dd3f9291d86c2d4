use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::db::DB_FILENAME;
use crate::error::UnmigratorError;
use crate::selector::DEFAULT_BATCH_SIZE;
use crate::transformer::DEFAULT_IMAGE_SIZE;

pub static CONFIG: OnceCell<Config> = OnceCell::new();

const ENV_PREFIX: &str = "PFUNMIGRATE_";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub pfunmigrate: String,
}

impl LoggingConfig {
    const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];
    const PFUNMIGRATE_LEVEL: &str = "info";

    fn default() -> Self {
        LoggingConfig {
            pfunmigrate: Self::PFUNMIGRATE_LEVEL.to_string(),
        }
    }

    fn ensure_valid(&mut self) {
        let str_original = self.pfunmigrate.clone();
        self.pfunmigrate = self.pfunmigrate.trim().to_ascii_lowercase();
        if !Self::LOG_LEVELS.contains(&self.pfunmigrate.as_str()) {
            eprintln!(
                "Config error: pfunmigrate log level of '{}' is invalid - using default of '{}'",
                str_original,
                Self::PFUNMIGRATE_LEVEL
            );
            self.pfunmigrate = Self::PFUNMIGRATE_LEVEL.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MigrationConfig {
    batch_size: usize,
    image_size: String,
}

impl MigrationConfig {
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn image_size(&self) -> &str {
        &self.image_size
    }

    fn default() -> Self {
        MigrationConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            image_size: DEFAULT_IMAGE_SIZE.to_owned(),
        }
    }

    fn ensure_valid(&mut self) {
        if self.batch_size == 0 {
            eprintln!(
                "Config error: batch_size of 0 is invalid - using default of {}",
                DEFAULT_BATCH_SIZE
            );
            self.batch_size = DEFAULT_BATCH_SIZE;
        }

        let str_original = self.image_size.clone();
        self.image_size = self.image_size.trim().to_ascii_lowercase();
        let valid = !self.image_size.is_empty()
            && self
                .image_size
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            eprintln!(
                "Config error: image_size of '{}' is invalid - using default of '{}'",
                str_original, DEFAULT_IMAGE_SIZE
            );
            self.image_size = DEFAULT_IMAGE_SIZE.to_owned();
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Empty means the default location in the app's data directory.
    path: String,
}

impl DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: String::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub logging: LoggingConfig,
    pub migration: MigrationConfig,
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logging: LoggingConfig::default(),
            migration: MigrationConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Loads the configuration from `config.toml` in the app's data directory,
    /// with `PFUNMIGRATE_` environment variables layered on top.
    /// If the file is missing it is created from the defaults; if it fails to
    /// parse, defaults are used.
    pub fn load_config(project_dirs: &ProjectDirs) -> Self {
        let config_path = project_dirs.data_local_dir().join("config.toml");
        let default_config = Config::default();

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    eprintln!(
                        "Failed to create configuration directory {}: {}",
                        parent.display(),
                        e
                    );
                }
            }
            if let Ok(toml_string) = toml::to_string_pretty(&default_config) {
                if let Err(e) = fs::write(&config_path, toml_string) {
                    eprintln!(
                        "Failed to write default config to {}: {}",
                        config_path.display(),
                        e
                    );
                }
            } else {
                eprintln!("Failed to serialize default config.");
            }
        }

        Self::from_path(&config_path)
    }

    fn from_path(config_path: &Path) -> Self {
        let default_config = Config::default();

        // Defaults, then the TOML file (if it exists), then the environment
        let figment = Figment::from(Serialized::defaults(default_config.clone()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Config = figment.extract().unwrap_or_else(|err| {
            eprintln!(
                "Could not load config file {}: {}. Using default configuration.",
                config_path.display(),
                err
            );
            default_config
        });

        config.ensure_valid();

        config
    }

    fn ensure_valid(&mut self) {
        self.logging.ensure_valid();
        self.migration.ensure_valid();
    }

    pub fn get() -> Result<&'static Config, UnmigratorError> {
        CONFIG
            .get()
            .ok_or_else(|| UnmigratorError::ConfigError("Configuration not loaded".into()))
    }

    /// Database file to operate on: the configured path, or
    /// `unmigrator.db` in the app's data directory.
    pub fn database_path(&self, project_dirs: &ProjectDirs) -> PathBuf {
        let configured = self.database.path.trim();
        if configured.is_empty() {
            project_dirs.data_local_dir().join(DB_FILENAME)
        } else {
            PathBuf::from(configured)
        }
    }

    /// flexi_logger spec string for the configured levels.
    pub fn log_spec(&self) -> String {
        format!("pfunmigrate={}", self.logging.pfunmigrate)
    }
}
