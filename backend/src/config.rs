use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub upload_dir: PathBuf,
    pub body_limit_mb: usize,
    pub session_ttl_minutes: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            model_path: PathBuf::from("./models/bt_resnet50_model.pt"),
            upload_dir: PathBuf::from("./static/images"),
            body_limit_mb: 16,
            session_ttl_minutes: 60,
        }
    }
}

impl AppConfig {
    /// Reads `BT_CONFIG` (default `config/app.yaml`) when it exists, then
    /// applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            env::var("BT_CONFIG").unwrap_or_else(|_| "config/app.yaml".to_string());
        let mut config = Self::from_file(Path::new(&config_path))?;
        config.apply_overrides(|key| env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(config_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(config_str)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = parse_env("PORT", port)?;
        }
        if let Some(model_path) = lookup("MODEL_PATH") {
            self.model_path = PathBuf::from(model_path);
        }
        if let Some(upload_dir) = lookup("UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(upload_dir);
        }
        if let Some(limit) = lookup("BODY_LIMIT_MB") {
            self.body_limit_mb = parse_env("BODY_LIMIT_MB", limit)?;
        }
        if let Some(ttl) = lookup("SESSION_TTL_MINUTES") {
            self.session_ttl_minutes = parse_env("SESSION_TTL_MINUTES", ttl)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.body_limit_bytes()?;
        self.session_ttl()?;
        Ok(())
    }

    pub fn body_limit_bytes(&self) -> Result<usize, ConfigError> {
        let invalid = || ConfigError::InvalidEnv {
            key: "BODY_LIMIT_MB",
            value: self.body_limit_mb.to_string(),
        };
        if self.body_limit_mb == 0 {
            return Err(invalid());
        }
        self.body_limit_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(invalid)
    }

    /// Idle lifetime of a browser session; must be a positive number of minutes.
    pub fn session_ttl(&self) -> Result<chrono::Duration, ConfigError> {
        let invalid = || ConfigError::InvalidEnv {
            key: "SESSION_TTL_MINUTES",
            value: self.session_ttl_minutes.to_string(),
        };
        if self.session_ttl_minutes <= 0 {
            return Err(invalid());
        }
        chrono::Duration::try_minutes(self.session_ttl_minutes).ok_or_else(invalid)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_the_development_server() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:5000");
        assert_eq!(config.upload_dir, PathBuf::from("./static/images"));
        assert_eq!(config.body_limit_bytes().unwrap(), 16 * 1024 * 1024);
        assert_eq!(config.session_ttl().unwrap(), chrono::Duration::minutes(60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let config = AppConfig::from_yaml("port: 8081\nmodel_path: /opt/model.pt\n").unwrap();
        assert_eq!(config.port, 8081);
        assert_eq!(config.model_path, PathBuf::from("/opt/model.pt"));
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.session_ttl_minutes, 60);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::from_file(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn environment_overrides_file_values() {
        let vars: HashMap<&str, &str> = [("PORT", "9000"), ("UPLOAD_DIR", "/tmp/uploads")].into();
        let mut config = AppConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/uploads"));
    }

    #[test]
    fn invalid_numeric_override_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|key| (key == "PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { key: "PORT", .. }));
    }

    fn with_override(key: &'static str, value: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config
            .apply_overrides(|k| (k == key).then(|| value.to_string()))
            .unwrap();
        config
    }

    #[test]
    fn non_positive_session_ttl_is_rejected() {
        for value in ["0", "-5"] {
            let config = with_override("SESSION_TTL_MINUTES", value);
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidEnv { key: "SESSION_TTL_MINUTES", .. })
            ));
        }
    }

    #[test]
    fn out_of_range_session_ttl_is_rejected() {
        let config = with_override("SESSION_TTL_MINUTES", &i64::MAX.to_string());
        assert!(matches!(
            config.session_ttl(),
            Err(ConfigError::InvalidEnv { key: "SESSION_TTL_MINUTES", .. })
        ));
    }

    #[test]
    fn zero_body_limit_is_rejected() {
        let config = with_override("BODY_LIMIT_MB", "0");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidEnv { key: "BODY_LIMIT_MB", .. })
        ));
    }

    #[test]
    fn overflowing_body_limit_is_rejected() {
        let config = with_override("BODY_LIMIT_MB", &usize::MAX.to_string());
        assert!(matches!(
            config.body_limit_bytes(),
            Err(ConfigError::InvalidEnv { key: "BODY_LIMIT_MB", .. })
        ));
    }

    #[test]
    fn invalid_yaml_values_fail_validation() {
        let config = AppConfig::from_yaml("session_ttl_minutes: -1\n").unwrap();
        assert!(config.validate().is_err());
    }
}
