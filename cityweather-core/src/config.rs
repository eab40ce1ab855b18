use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

pub const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
pub const DEFAULT_GEOCODING_URL: &str = "https://api.openweathermap.org/geo/1.0";

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// weather_url = "https://api.openweathermap.org/data/2.5/weather"
/// geocoding_url = "https://api.openweathermap.org/geo/1.0"
/// db_path = "/home/me/.local/share/cityweather/weather.db"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub api_key: Option<String>,
    pub weather_url: Option<String>,
    pub geocoding_url: Option<String>,
    pub db_path: Option<PathBuf>,
}

impl Config {
    /// Load config from disk and apply environment overrides.
    pub fn load() -> Result<Self> {
        let cfg = Self::load_file()?;
        Ok(cfg.with_env(|key| std::env::var(key).ok()))
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Overlay `API_KEY`, `WEATHER_API`, `GEOCODING_API` and `DB_URL`.
    /// Non-empty environment values win over the file.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(url) = get("WEATHER_API") {
            self.weather_url = Some(url);
        }
        if let Some(url) = get("GEOCODING_API") {
            self.geocoding_url = Some(url);
        }
        if let Some(path) = get("DB_URL") {
            self.db_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("dev", "cityweather", "cityweather")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Directory for the database and the interactive-mode log file.
    pub fn data_dir() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    pub fn api_key(&self) -> Result<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            anyhow!(
                "No API key configured.\n\
                 Hint: run `cityweather configure` or set the API_KEY environment variable."
            )
        })
    }

    pub fn weather_url(&self) -> &str {
        self.weather_url.as_deref().unwrap_or(DEFAULT_WEATHER_URL)
    }

    pub fn geocoding_url(&self) -> &str {
        self.geocoding_url.as_deref().unwrap_or(DEFAULT_GEOCODING_URL)
    }

    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("weather.db")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn api_key_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.api_key().unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No API key configured"));
        assert!(msg.contains("Hint: run `cityweather configure`"));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let cfg = Config { api_key: Some("  ".into()), ..Config::default() };
        assert!(cfg.api_key().is_err());
    }

    #[test]
    fn urls_fall_back_to_openweather_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.weather_url(), DEFAULT_WEATHER_URL);
        assert_eq!(cfg.geocoding_url(), DEFAULT_GEOCODING_URL);
    }

    #[test]
    fn env_overrides_file_values() {
        let cfg = Config {
            api_key: Some("FILE_KEY".into()),
            weather_url: Some("http://file/weather".into()),
            ..Config::default()
        }
        .with_env(env(&[
            ("API_KEY", "ENV_KEY"),
            ("GEOCODING_API", "http://env/geo"),
            ("DB_URL", "/tmp/w.db"),
        ]));

        assert_eq!(cfg.api_key().expect("key must exist"), "ENV_KEY");
        assert_eq!(cfg.weather_url(), "http://file/weather");
        assert_eq!(cfg.geocoding_url(), "http://env/geo");
        assert_eq!(cfg.database_path().expect("explicit path"), PathBuf::from("/tmp/w.db"));
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let cfg = Config { api_key: Some("FILE_KEY".into()), ..Config::default() }
            .with_env(env(&[("API_KEY", "")]));

        assert_eq!(cfg.api_key().expect("key must exist"), "FILE_KEY");
    }

    #[test]
    fn toml_roundtrip() {
        let cfg = Config {
            api_key: Some("KEY".into()),
            weather_url: None,
            geocoding_url: Some("http://geo".into()),
            db_path: Some(PathBuf::from("/data/weather.db")),
        };

        let text = toml::to_string_pretty(&cfg).expect("serializable");
        let back: Config = toml::from_str(&text).expect("parseable");
        assert_eq!(back, cfg);
    }
}
