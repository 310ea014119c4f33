//! Handles the configuration of the client.
//!
//! this module is responsible for parsing the Cadence.toml file and applying the environment
//! overrides on top of it.

use config::{Config, ConfigError, Environment, File};
use log::info;
use serde::Deserialize;
use strum::{Display, EnumIter, EnumString};

use std::{path::PathBuf, str::FromStr, sync::Arc};

use cadence_storage::{cache::AudioCache, fetch::AudioFetcher};

use crate::errors::CacheSetupError;

pub static DEFAULT_CONFIG: &str = include_str!("../Cadence.toml");

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Settings {
    /// What level of logging to use.
    /// Default is "info".
    #[serde(default = "default_log_level")]
    #[serde(deserialize_with = "de_log_level")]
    pub log_level: log::LevelFilter,
    /// Settings shared by the inline players and the now-playing bar.
    #[serde(default)]
    pub player: PlayerSettings,
    /// Where offline audio is kept.
    #[serde(default)]
    pub cache: CacheSettings,
}

impl Default for Settings {
    #[inline]
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            player: PlayerSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from the config file and environment variables.
    ///
    /// The environment variables are prefixed with `CADENCE_`, nested keys are separated by `__`
    /// (e.g. `CADENCE_PLAYER__SKIP_SECONDS=15`).
    ///
    /// # Errors
    ///
    /// This function will return an error if the config file is not found or if the config file is
    /// invalid.
    #[inline]
    pub fn init(config: PathBuf, log_level: Option<log::LevelFilter>) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from(config))
            .add_source(
                Environment::with_prefix("CADENCE")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        if let Some(path) = &mut settings.cache.path {
            *path = shellexpand::tilde(&path.to_string_lossy())
                .into_owned()
                .into();
        }

        if let Some(log_level) = log_level {
            settings.log_level = log_level;
        }

        Ok(settings)
    }

    /// Get the (default) path to the config file.
    /// If the config file does not exist at this path, it will be created with the default config.
    ///
    /// See [`crate::get_config_dir`] for more information about where this default path is located.
    ///
    /// # Errors
    ///
    /// This function will return an error if the system config directory could not be found, or if
    /// the config file was missing and could not be created.
    #[inline]
    pub fn get_config_path() -> Result<PathBuf, std::io::Error> {
        let config_dir = crate::get_config_dir()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::NotFound, e.to_string()))?;

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir)?;
        }
        let config_file = config_dir.join("Cadence.toml");

        if !config_file.exists() {
            std::fs::write(&config_file, DEFAULT_CONFIG)?;
        }

        Ok(config_file)
    }
}

fn de_log_level<'de, D>(deserializer: D) -> Result<log::LevelFilter, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    Ok(log::LevelFilter::from_str(&s).unwrap_or_else(|_| default_log_level()))
}

const fn default_log_level() -> log::LevelFilter {
    log::LevelFilter::Info
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct PlayerSettings {
    /// How far the skip buttons jump, in seconds.
    /// Default is 10.
    #[serde(default = "default_skip_seconds")]
    pub skip_seconds: f64,
    /// The volume the now-playing bar starts at, between 0 and 1.
    /// Default is 1.
    #[serde(default = "default_volume")]
    #[serde(deserialize_with = "de_volume")]
    pub default_volume: f32,
}

const fn default_skip_seconds() -> f64 {
    10.0
}

const fn default_volume() -> f32 {
    1.0
}

fn de_volume<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let volume = f32::deserialize(deserializer)?;
    if volume.is_nan() {
        return Ok(default_volume());
    }
    Ok(volume.clamp(0.0, 1.0))
}

impl Default for PlayerSettings {
    #[inline]
    fn default() -> Self {
        Self {
            skip_seconds: default_skip_seconds(),
            default_volume: default_volume(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Display, Deserialize, PartialEq, Eq, EnumIter, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CacheBackend {
    /// Gone when the app closes.
    Memory,
    /// A SurrealKV database on disk.
    #[default]
    Disk,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct CacheSettings {
    #[serde(default)]
    pub backend: CacheBackend,
    /// Where the disk backend keeps its database.
    /// Defaults to `audio-cache` in the data directory (see [`crate::get_data_dir`]).
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl CacheSettings {
    /// The database path the disk backend would use.
    ///
    /// # Errors
    ///
    /// Returns an error if no path is configured and the data directory cannot be found.
    pub fn resolved_path(&self) -> Result<PathBuf, CacheSetupError> {
        match &self.path {
            Some(path) => Ok(path.clone()),
            None => Ok(crate::get_data_dir()?.join("audio-cache")),
        }
    }

    /// Open the configured cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the database path cannot be determined or the database cannot be opened.
    pub async fn open(&self, fetcher: Arc<dyn AudioFetcher>) -> Result<AudioCache, CacheSetupError> {
        let cache = match self.backend {
            CacheBackend::Memory => AudioCache::in_memory(fetcher).await?,
            CacheBackend::Disk => AudioCache::open(self.resolved_path()?, fetcher).await?,
        };
        info!("Opened the {} audio cache", self.backend);
        Ok(cache)
    }
}
