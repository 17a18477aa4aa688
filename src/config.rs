use config::{Config, ConfigError, Environment, File};
use log::LevelFilter;
use serde::Deserialize;
use std::path::Path;

pub const DEFAULT_CONFIG_NAME: &str = "media-date-fill";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub backup_dir_name: String,
    pub follow_links: bool,
    pub preserve_mtime: bool,
}

impl AppConfig {
    /// Defaults, then `media-date-fill.toml` (or `explicit`, which must exist),
    /// then `MEDIA_DATE_FILL_*` variables.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match explicit {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let s = Config::builder()
            .set_default("log_level", "INFO")?
            .set_default("backup_dir_name", "backup_original")?
            .set_default("follow_links", false)?
            .set_default("preserve_mtime", true)?
            .add_source(file)
            .add_source(Environment::with_prefix("MEDIA_DATE_FILL"))
            .build()?;

        let cfg: AppConfig = s.try_deserialize()?;
        cfg.log_filter()?;
        Ok(cfg)
    }

    pub fn log_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::Message(format!("invalid log_level {:?}", self.log_level)))
    }
}
