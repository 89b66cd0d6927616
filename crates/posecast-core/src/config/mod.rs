//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::anchors::MAX_ANCHORED_OBJECTS;
use crate::transport::DEFAULT_TIMEOUT_SECS;

/// Environment variable holding the shared secret
pub const SECRET_ENV_VAR: &str = "POSECAST_SHARED_SECRET";

/// Query parameter carrying the shared secret in a page URL
pub const SECRET_QUERY_PARAM: &str = "secret";

/// Posecast configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub telemetry: TelemetryConfig,
    pub anchors: AnchorConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub endpoint: String,
    pub interval_ms: u64,
    pub timeout_secs: u64,
    /// Never persisted; see [`TelemetryConfig::resolved_secret`]
    #[serde(skip)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorConfig {
    pub max_anchored_objects: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub prefer_ar: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/api/report".to_string(),
            interval_ms: 100,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            secret: None,
        }
    }
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            max_anchored_objects: MAX_ANCHORED_OBJECTS,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { prefer_ar: true }
    }
}

impl TelemetryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Read the `secret` query parameter from a page URL
    pub fn secret_from_url(page_url: &str) -> anyhow::Result<Option<String>> {
        let url = Url::parse(page_url).with_context(|| format!("Invalid page URL: {}", page_url))?;
        Ok(url
            .query_pairs()
            .find(|(key, _)| key == SECRET_QUERY_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty()))
    }

    /// Resolve the shared secret.
    ///
    /// The page URL's `secret` parameter wins, then the environment. An absent
    /// secret means requests go out unauthenticated.
    pub fn resolved_secret(&self, page_url: Option<&str>) -> anyhow::Result<Option<String>> {
        self.enforce_not_persisted()?;

        if let Some(url) = page_url
            && let Some(secret) = Self::secret_from_url(url)?
        {
            return Ok(Some(secret));
        }

        Ok(env::var(SECRET_ENV_VAR).ok().filter(|s| !s.is_empty()))
    }

    pub fn redacted_secret(&self, page_url: Option<&str>) -> anyhow::Result<Option<String>> {
        self.resolved_secret(page_url).map(|opt| {
            opt.map(|secret| {
                let chars = secret.chars().count();
                if chars <= 4 {
                    "***".to_string()
                } else {
                    let suffix: String = secret.chars().skip(chars - 4).collect();
                    format!("***{}", suffix)
                }
            })
        })
    }

    pub fn enforce_not_persisted(&self) -> anyhow::Result<()> {
        if self.secret.is_some() {
            return Err(anyhow!(
                "Shared secrets must be provided via the page URL or {}, not stored in configuration",
                SECRET_ENV_VAR
            ));
        }
        Ok(())
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("POSECAST_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("posecast")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or the defaults if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Reset configuration to defaults by removing the config file
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.telemetry.enforce_not_persisted()?;
        Url::parse(&self.telemetry.endpoint)
            .with_context(|| format!("Invalid telemetry endpoint: {}", self.telemetry.endpoint))?;
        if self.telemetry.interval_ms == 0 {
            return Err(anyhow!("telemetry.interval_ms must be greater than 0"));
        }
        if self.telemetry.timeout_secs == 0 {
            return Err(anyhow!("telemetry.timeout_secs must be greater than 0"));
        }
        if self.anchors.max_anchored_objects == 0 {
            return Err(anyhow!("anchors.max_anchored_objects must be at least 1"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "telemetry.endpoint" => Ok(self.telemetry.endpoint.clone()),
            "telemetry.interval_ms" => Ok(self.telemetry.interval_ms.to_string()),
            "telemetry.timeout_secs" => Ok(self.telemetry.timeout_secs.to_string()),
            "telemetry.secret" | "secret" => match self.telemetry.redacted_secret(None)? {
                Some(redacted) => Ok(redacted),
                None => Ok(format!(
                    "(not set - use ?{}= on the page URL or the {} env var)",
                    SECRET_QUERY_PARAM, SECRET_ENV_VAR
                )),
            },
            "anchors.max_anchored_objects" => Ok(self.anchors.max_anchored_objects.to_string()),
            "session.prefer_ar" => Ok(self.session.prefer_ar.to_string()),
            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `posecast config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "telemetry.endpoint" => {
                Url::parse(value).with_context(|| format!("Invalid endpoint URL: {}", value))?;
                self.telemetry.endpoint = value.to_string();
            }
            "telemetry.interval_ms" => {
                let interval: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid interval value: {}", value))?;
                if interval == 0 {
                    return Err(anyhow!("Interval must be greater than 0"));
                }
                self.telemetry.interval_ms = interval;
            }
            "telemetry.timeout_secs" => {
                let timeout: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid timeout value: {}", value))?;
                if timeout == 0 {
                    return Err(anyhow!("Timeout must be greater than 0"));
                }
                self.telemetry.timeout_secs = timeout;
            }
            "telemetry.secret" | "secret" => {
                return Err(anyhow!(
                    "The shared secret cannot be stored in configuration. Set {} or pass ?{}= on the page URL.",
                    SECRET_ENV_VAR,
                    SECRET_QUERY_PARAM
                ));
            }
            "anchors.max_anchored_objects" => {
                let max: usize = value
                    .parse()
                    .with_context(|| format!("Invalid anchor limit: {}", value))?;
                if max == 0 {
                    return Err(anyhow!("Anchor limit must be at least 1"));
                }
                self.anchors.max_anchored_objects = max;
            }
            "session.prefer_ar" => {
                self.session.prefer_ar = value
                    .parse()
                    .with_context(|| format!("Invalid boolean: {}", value))?;
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `posecast config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        const KEYS: [&str; 6] = [
            "telemetry.endpoint",
            "telemetry.interval_ms",
            "telemetry.timeout_secs",
            "telemetry.secret",
            "anchors.max_anchored_objects",
            "session.prefer_ar",
        ];
        KEYS.iter()
            .map(|key| Ok((key.to_string(), self.get(key)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.telemetry.endpoint, "http://localhost:8000/api/report");
        assert_eq!(config.telemetry.interval(), Duration::from_millis(100));
        assert_eq!(config.anchors.max_anchored_objects, 30);
        assert!(config.session.prefer_ar);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_secret_from_url() {
        let secret = TelemetryConfig::secret_from_url(
            "https://example.test/static/viewer.html?usePolyfill=false&secret=s3cr%20t",
        )
        .unwrap();
        assert_eq!(secret.as_deref(), Some("s3cr t"));

        assert_eq!(
            TelemetryConfig::secret_from_url("https://example.test/viewer.html").unwrap(),
            None
        );
        assert_eq!(
            TelemetryConfig::secret_from_url("https://example.test/viewer.html?secret=").unwrap(),
            None
        );
        assert!(TelemetryConfig::secret_from_url("not a url").is_err());
    }

    #[test]
    fn test_url_secret_wins() {
        let config = TelemetryConfig::default();
        let secret = config
            .resolved_secret(Some("https://example.test/?secret=from-url"))
            .unwrap();
        assert_eq!(secret.as_deref(), Some("from-url"));
    }

    #[test]
    fn test_persisted_secret_rejected() {
        let mut config = Config::default();
        config.telemetry.secret = Some("oops".to_string());
        assert!(config.validate().is_err());
        assert!(config.telemetry.resolved_secret(None).is_err());
    }

    #[test]
    fn test_secret_cannot_be_set() {
        let mut config = Config::default();
        assert!(config.set("telemetry.secret", "abc").is_err());
        assert!(config.set("secret", "abc").is_err());
    }

    #[test]
    fn test_set_and_get() {
        let mut config = Config::default();
        config.set("telemetry.interval_ms", "250").unwrap();
        config.set("anchors.max_anchored_objects", "5").unwrap();
        config.set("session.prefer_ar", "false").unwrap();
        config
            .set("telemetry.endpoint", "https://collector.test/api/report")
            .unwrap();

        assert_eq!(config.get("telemetry.interval_ms").unwrap(), "250");
        assert_eq!(config.get("anchors.max_anchored_objects").unwrap(), "5");
        assert_eq!(config.get("session.prefer_ar").unwrap(), "false");
        assert_eq!(
            config.get("telemetry.endpoint").unwrap(),
            "https://collector.test/api/report"
        );
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();
        assert!(config.set("telemetry.interval_ms", "0").is_err());
        assert!(config.set("telemetry.interval_ms", "fast").is_err());
        assert!(config.set("anchors.max_anchored_objects", "0").is_err());
        assert!(config.set("telemetry.endpoint", "nowhere").is_err());
        assert!(config.set("session.prefer_ar", "maybe").is_err());
        assert!(config.set("unknown.key", "1").is_err());
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.set("telemetry.interval_ms", "50").unwrap();
        config.save_to(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(!contents.contains("secret"));

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[telemetry]\nendpoint = \"http://x/api/report\"\ninterval_ms = 0\ntimeout_secs = 1\n\
             [anchors]\nmax_anchored_objects = 3\n[session]\nprefer_ar = true\n",
        )
        .unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_list_covers_every_key() {
        let config = Config::default();
        let keys: Vec<String> = config.list().unwrap().into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys.len(), 6);
        assert!(keys.contains(&"anchors.max_anchored_objects".to_string()));
    }
}
