//! Remote Service Configuration
//!
//! Connection settings for the hosted backend, stored as JSON next to the
//! app's other data. `SUPABASE_URL` and `SUPABASE_ANON_KEY` override the file.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = "remote_config.json";
pub const URL_ENV: &str = "SUPABASE_URL";
pub const ANON_KEY_ENV: &str = "SUPABASE_ANON_KEY";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    pub url: String,
    /// Public (anon) API key
    pub anon_key: String,
    /// Items table
    pub table: String,
    pub schema: String,
    /// Realtime channel name
    pub channel: String,
    pub heartbeat_secs: u64,
    /// Fold the rows returned by our own writes into the list
    pub apply_write_results: bool,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            anon_key: String::new(),
            table: "todos".to_string(),
            schema: "public".to_string(),
            channel: "any".to_string(),
            heartbeat_secs: 25,
            apply_write_results: true,
        }
    }
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            anon_key: anon_key.into(),
            ..Default::default()
        }
    }

    /// Parsed project URL (always ends with `/` so joins keep the path)
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let trimmed = self.url.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::Missing("service URL"));
        }
        let with_slash = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        };
        let url = Url::parse(&with_slash).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::InvalidUrl(format!("unsupported scheme '{}'", other))),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;
        if self.anon_key.trim().is_empty() {
            return Err(ConfigError::Missing("anon key"));
        }
        if self.table.trim().is_empty() {
            return Err(ConfigError::Missing("table name"));
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.validate().is_ok()
    }

    /// Read the config file (if any) and apply environment overrides.
    ///
    /// Returns `None` when neither source provides anything.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    pub fn load_with(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let from_file = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Some(serde_json::from_str::<RemoteConfig>(&content)?)
        } else {
            None
        };

        let env_url = env(URL_ENV).filter(|v| !v.trim().is_empty());
        let env_key = env(ANON_KEY_ENV).filter(|v| !v.trim().is_empty());
        if from_file.is_none() && env_url.is_none() && env_key.is_none() {
            return Ok(None);
        }

        let mut config = from_file.unwrap_or_default();
        if let Some(url) = env_url {
            config.url = url;
        }
        if let Some(key) = env_key {
            config.anon_key = key;
        }
        Ok(Some(config))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = RemoteConfig::new("https://abc.supabase.co", "key");
        assert_eq!(config.table, "todos");
        assert_eq!(config.heartbeat_secs, 25);
        assert!(config.apply_write_results);
        assert!(config.is_complete());
    }

    #[test]
    fn test_base_url_keeps_path() {
        let config = RemoteConfig::new("http://localhost:54321/proxy", "key");
        let url = config.base_url().unwrap();
        assert_eq!(url.join("rest/v1/todos").unwrap().as_str(), "http://localhost:54321/proxy/rest/v1/todos");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(matches!(
            RemoteConfig::new("", "key").validate(),
            Err(ConfigError::Missing(_))
        ));
        assert!(matches!(
            RemoteConfig::new("ftp://abc", "key").validate(),
            Err(ConfigError::InvalidUrl(_))
        ));
        assert!(matches!(
            RemoteConfig::new("https://abc.supabase.co", "  ").validate(),
            Err(ConfigError::Missing("anon key"))
        ));
    }

    #[test]
    fn test_load_missing_file_without_env() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = RemoteConfig::load_with(&dir.path().join(CONFIG_FILE_NAME), no_env).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = RemoteConfig::new("https://abc.supabase.co", "key");
        config.table = "items".into();
        config.save(&path).unwrap();

        let loaded = RemoteConfig::load_with(&path, no_env).unwrap().unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{"url":"https://abc.supabase.co","anon_key":"k"}"#).unwrap();

        let loaded = RemoteConfig::load_with(&path, no_env).unwrap().unwrap();
        assert_eq!(loaded.channel, "any");
        assert_eq!(loaded.schema, "public");
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        RemoteConfig::new("https://file.supabase.co", "file-key").save(&path).unwrap();

        let loaded = RemoteConfig::load_with(&path, |key| match key {
            URL_ENV => Some("https://env.supabase.co".to_string()),
            _ => None,
        })
        .unwrap()
        .unwrap();
        assert_eq!(loaded.url, "https://env.supabase.co");
        assert_eq!(loaded.anon_key, "file-key");
    }

    #[test]
    fn test_save_refuses_invalid_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(RemoteConfig::new("not a url", "k").save(&path).is_err());
        assert!(!path.exists());
    }
}
