use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8080";
pub const DEFAULT_FXRATES_URL: &str = "https://api.ojoporciento.com";
pub const DEFAULT_FXRATES_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment overrides take precedence over the config file.
pub const ENV_TELEGRAM_TOKEN: &str = "CHIGUI_TELEGRAM_TOKEN";
pub const ENV_WEBHOOK_URL: &str = "CHIGUI_WEBHOOK_URL";
pub const ENV_WEBHOOK_LISTEN_ADDR: &str = "CHIGUI_WEBHOOK_LISTEN_ADDR";
pub const ENV_WEBHOOK_SECRET_TOKEN: &str = "CHIGUI_WEBHOOK_SECRET_TOKEN";
pub const ENV_FXRATES_URL: &str = "CHIGUI_FXRATES_URL";
pub const ENV_FXRATES_TIMEOUT: &str = "CHIGUI_FXRATES_TIMEOUT";

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse TOML.
    ParseToml { path: PathBuf, source: toml::de::Error },
    /// Unparseable timeout value.
    InvalidTimeout { value: String, source: humantime::DurationError },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseToml { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::InvalidTimeout { value, source } => {
                write!(f, "invalid fxrates timeout '{}': {}", value, source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseToml { source, .. } => Some(source),
            Self::InvalidTimeout { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

/// On-disk TOML shape. Every key is optional and falls back to a default,
/// so a partial file still yields a complete configuration.
#[derive(Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,
    #[serde(default)]
    pub telegram: TelegramFile,
    #[serde(default)]
    pub fxrates: FxRatesFile,
}

#[derive(Serialize, Deserialize, Default)]
pub struct TelegramFile {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default)]
    pub webhook_secret_token: String,
}

#[derive(Serialize, Deserialize)]
pub struct FxRatesFile {
    #[serde(default = "default_fxrates_url")]
    pub base_url: String,
    /// Humantime duration string, e.g. "10s".
    #[serde(default = "default_fxrates_timeout")]
    pub timeout: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            telegram: TelegramFile::default(),
            fxrates: FxRatesFile::default(),
        }
    }
}

impl Default for FxRatesFile {
    fn default() -> Self {
        Self {
            base_url: default_fxrates_url(),
            timeout: default_fxrates_timeout(),
        }
    }
}

fn default_listen_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

fn default_fxrates_url() -> String {
    DEFAULT_FXRATES_URL.to_string()
}

fn default_fxrates_timeout() -> String {
    humantime::format_duration(DEFAULT_FXRATES_TIMEOUT).to_string()
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Address the webhook HTTP server binds to.
    pub listen_address: String,
    pub telegram: TelegramConfig,
    pub fxrates: FxRatesConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TelegramConfig {
    pub token: String,
    /// Public HTTPS URL Telegram delivers updates to. Empty means long polling.
    pub webhook_url: String,
    pub webhook_secret_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FxRatesConfig {
    pub base_url: String,
    pub timeout: Duration,
}

/// How updates are received from Telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Webhook,
    Polling,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            telegram: TelegramConfig {
                token: String::new(),
                webhook_url: String::new(),
                webhook_secret_token: String::new(),
            },
            fxrates: FxRatesConfig {
                base_url: DEFAULT_FXRATES_URL.to_string(),
                timeout: DEFAULT_FXRATES_TIMEOUT,
            },
        }
    }
}

impl Config {
    /// Reads the configuration from a TOML file.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file: ConfigFile = toml::from_str(&content).map_err(|e| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_file(file)
    }

    fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let timeout =
            humantime::parse_duration(&file.fxrates.timeout).map_err(|e| {
                ConfigError::InvalidTimeout {
                    value: file.fxrates.timeout.clone(),
                    source: e,
                }
            })?;

        Ok(Self {
            listen_address: file.listen_address,
            telegram: TelegramConfig {
                token: file.telegram.token,
                webhook_url: file.telegram.webhook_url,
                webhook_secret_token: file.telegram.webhook_secret_token,
            },
            fxrates: FxRatesConfig {
                base_url: file.fxrates.base_url,
                timeout,
            },
        })
    }

    /// Applies CHIGUI_* environment overrides on top of the file values.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(v) = env::var(ENV_TELEGRAM_TOKEN) {
            self.telegram.token = v;
        }

        if let Ok(v) = env::var(ENV_WEBHOOK_URL) {
            self.telegram.webhook_url = v;
        }

        if let Ok(v) = env::var(ENV_WEBHOOK_LISTEN_ADDR) {
            self.listen_address = v;
        }

        if let Ok(v) = env::var(ENV_WEBHOOK_SECRET_TOKEN) {
            self.telegram.webhook_secret_token = v;
        }

        if let Ok(v) = env::var(ENV_FXRATES_URL) {
            self.fxrates.base_url = v;
        }

        if let Ok(v) = env::var(ENV_FXRATES_TIMEOUT) {
            self.fxrates.timeout =
                humantime::parse_duration(&v).map_err(|e| ConfigError::InvalidTimeout {
                    value: v,
                    source: e,
                })?;
        }

        Ok(())
    }

    /// Checks the configuration is complete enough to start.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.token.trim().is_empty() {
            return Err(ConfigError::Validation("missing telegram token".into()));
        }

        if self.listen_address.trim().is_empty() {
            return Err(ConfigError::Validation("missing listen address".into()));
        }

        if !is_host_port(&self.listen_address) {
            return Err(ConfigError::Validation(format!(
                "invalid listen address: {:?}",
                self.listen_address
            )));
        }

        if self.fxrates.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("missing fxrates base url".into()));
        }

        match reqwest::Url::parse(&self.fxrates.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(_) => {
                return Err(ConfigError::Validation(format!(
                    "fxrates base url must use http or https: {:?}",
                    self.fxrates.base_url
                )));
            }
            Err(_) => {
                return Err(ConfigError::Validation(format!(
                    "invalid fxrates base url: {:?}",
                    self.fxrates.base_url
                )));
            }
        }

        if self.fxrates.timeout.is_zero() {
            return Err(ConfigError::Validation(
                "fxrates timeout must be positive".into(),
            ));
        }

        // Webhook settings are only required when a webhook URL is configured.
        if self.telegram.webhook_url.trim().is_empty() {
            return Ok(());
        }

        match reqwest::Url::parse(&self.telegram.webhook_url) {
            Ok(url) if url.scheme() == "https" => {}
            Ok(_) => {
                return Err(ConfigError::Validation(format!(
                    "webhook url must use https: {:?}",
                    self.telegram.webhook_url
                )));
            }
            Err(_) => {
                return Err(ConfigError::Validation(format!(
                    "invalid webhook url: {:?}",
                    self.telegram.webhook_url
                )));
            }
        }

        if self.telegram.webhook_secret_token.trim().is_empty() {
            return Err(ConfigError::Validation(
                "missing webhook secret token".into(),
            ));
        }

        // Telegram accepts 1-256 characters from A-Z, a-z, 0-9, _ and -.
        let secret = &self.telegram.webhook_secret_token;
        if secret.len() > 256
            || !secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-'))
        {
            return Err(ConfigError::Validation(format!(
                "invalid webhook secret token: {:?}",
                secret
            )));
        }

        Ok(())
    }

    /// A configured webhook URL selects webhook mode; otherwise long polling.
    pub fn run_mode(&self) -> RunMode {
        if self.telegram.webhook_url.trim().is_empty() {
            RunMode::Polling
        } else {
            RunMode::Webhook
        }
    }
}

/// Listen addresses use host:port form; the port must be numeric since it
/// goes straight into a TCP bind.
fn is_host_port(addr: &str) -> bool {
    let Some((host, port)) = addr.rsplit_once(':') else {
        return false;
    };

    !host.is_empty() && port.parse::<u16>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.telegram.token = "123456789:ABCdef".to_string();
        config
    }

    fn clear_env() {
        for name in [
            ENV_TELEGRAM_TOKEN,
            ENV_WEBHOOK_URL,
            ENV_WEBHOOK_LISTEN_ADDR,
            ENV_WEBHOOK_SECRET_TOKEN,
            ENV_FXRATES_URL,
            ENV_FXRATES_TIMEOUT,
        ] {
            unsafe { env::remove_var(name) };
        }
    }

    #[test]
    fn test_reads_full_file() {
        let file = write_config(
            r#"
            listen_address = "127.0.0.1:9000"

            [telegram]
            token = "123456789:ABCdef"
            webhook_url = "https://bot.example.com/hook"
            webhook_secret_token = "shhh"

            [fxrates]
            base_url = "https://rates.example.com"
            timeout = "3s"
            "#,
        );

        let config = Config::read(file.path()).expect("should load valid config");

        assert_eq!(config.listen_address, "127.0.0.1:9000");
        assert_eq!(config.telegram.token, "123456789:ABCdef");
        assert_eq!(config.telegram.webhook_url, "https://bot.example.com/hook");
        assert_eq!(config.telegram.webhook_secret_token, "shhh");
        assert_eq!(config.fxrates.base_url, "https://rates.example.com");
        assert_eq!(config.fxrates.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let file = write_config(
            r#"
            [telegram]
            token = "123456789:ABCdef"
            "#,
        );

        let config = Config::read(file.path()).expect("should load partial config");

        assert_eq!(config.listen_address, DEFAULT_LISTEN_ADDRESS);
        assert_eq!(config.fxrates.base_url, DEFAULT_FXRATES_URL);
        assert_eq!(config.fxrates.timeout, DEFAULT_FXRATES_TIMEOUT);
        assert!(config.telegram.webhook_url.is_empty());
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(Config::read("/nonexistent/path/config.toml"));

        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_toml() {
        let file = write_config("not toml = = =");

        let err = assert_err(Config::read(file.path()));

        assert!(matches!(err, ConfigError::ParseToml { .. }));
    }

    #[test]
    fn test_invalid_timeout_in_file() {
        let file = write_config(
            r#"
            [fxrates]
            timeout = "soon"
            "#,
        );

        let err = assert_err(Config::read(file.path()));

        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_validates_token_presence() {
        let mut config = valid_config();
        config.telegram.token = "   ".to_string();

        let err = assert_err(config.validate());

        assert!(err.to_string().contains("missing telegram token"));
    }

    #[test]
    fn test_validates_listen_address() {
        let mut config = valid_config();

        config.listen_address = String::new();
        let err = assert_err(config.validate());
        assert!(err.to_string().contains("missing listen address"));

        for addr in ["0.0.0.0", "0.0.0.0:port", ":8080", "host:99999"] {
            config.listen_address = addr.to_string();
            let err = assert_err(config.validate());
            assert!(
                err.to_string().contains("invalid listen address"),
                "addr {addr}"
            );
        }
    }

    #[test]
    fn test_validates_fxrates_url() {
        let mut config = valid_config();

        config.fxrates.base_url = " ".to_string();
        let err = assert_err(config.validate());
        assert!(err.to_string().contains("missing fxrates base url"));

        config.fxrates.base_url = "not a url".to_string();
        let err = assert_err(config.validate());
        assert!(err.to_string().contains("invalid fxrates base url"));

        config.fxrates.base_url = "ftp://rates.example.com".to_string();
        let err = assert_err(config.validate());
        assert!(err.to_string().contains("must use http or https"));
    }

    #[test]
    fn test_validates_timeout_positive() {
        let mut config = valid_config();
        config.fxrates.timeout = Duration::ZERO;

        let err = assert_err(config.validate());

        assert!(err.to_string().contains("fxrates timeout must be positive"));
    }

    #[test]
    fn test_validates_webhook_settings_only_when_url_set() {
        let mut config = valid_config();

        // No webhook URL: the secret is not required.
        config.validate().expect("polling config should validate");

        config.telegram.webhook_url = "http://bot.example.com/hook".to_string();
        config.telegram.webhook_secret_token = "shhh".to_string();
        let err = assert_err(config.validate());
        assert!(err.to_string().contains("webhook url must use https"));

        config.telegram.webhook_url = "https://bot.example.com/hook".to_string();
        config.telegram.webhook_secret_token = String::new();
        let err = assert_err(config.validate());
        assert!(err.to_string().contains("missing webhook secret token"));

        config.telegram.webhook_secret_token = "no spaces allowed".to_string();
        let err = assert_err(config.validate());
        assert!(err.to_string().contains("invalid webhook secret token"));

        config.telegram.webhook_secret_token = "shhh".to_string();
        config.validate().expect("webhook config should validate");
    }

    #[test]
    fn test_run_mode_follows_webhook_url() {
        let mut config = valid_config();
        assert_eq!(config.run_mode(), RunMode::Polling);

        config.telegram.webhook_url = "  ".to_string();
        assert_eq!(config.run_mode(), RunMode::Polling);

        config.telegram.webhook_url = "https://bot.example.com/hook".to_string();
        assert_eq!(config.run_mode(), RunMode::Webhook);
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_values() {
        clear_env();

        unsafe {
            env::set_var(ENV_TELEGRAM_TOKEN, "987:XYZ");
            env::set_var(ENV_WEBHOOK_URL, "https://env.example.com/hook");
            env::set_var(ENV_WEBHOOK_LISTEN_ADDR, "127.0.0.1:9999");
            env::set_var(ENV_WEBHOOK_SECRET_TOKEN, "env-secret");
            env::set_var(ENV_FXRATES_URL, "https://env-rates.example.com");
            env::set_var(ENV_FXRATES_TIMEOUT, "2s");
        }

        let mut config = valid_config();
        config.apply_env().expect("env should apply");

        assert_eq!(config.telegram.token, "987:XYZ");
        assert_eq!(config.telegram.webhook_url, "https://env.example.com/hook");
        assert_eq!(config.listen_address, "127.0.0.1:9999");
        assert_eq!(config.telegram.webhook_secret_token, "env-secret");
        assert_eq!(config.fxrates.base_url, "https://env-rates.example.com");
        assert_eq!(config.fxrates.timeout, Duration::from_secs(2));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_env_timeout_is_an_error() {
        clear_env();
        unsafe { env::set_var(ENV_FXRATES_TIMEOUT, "never") };

        let mut config = valid_config();
        let err = assert_err(config.apply_env());

        assert!(matches!(err, ConfigError::InvalidTimeout { .. }));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_absent_env_leaves_config_untouched() {
        clear_env();

        let mut config = valid_config();
        let before = config.clone();
        config.apply_env().expect("env should apply");

        assert_eq!(config, before);
    }
}
