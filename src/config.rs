use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    Development,
    Production,
    Testing,
}

impl AppEnv {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppEnv::Development => "development",
            AppEnv::Production => "production",
            AppEnv::Testing => "testing",
        }
    }
}

impl FromStr for AppEnv {
    type Err = config::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "development" => Ok(AppEnv::Development),
            "production" => Ok(AppEnv::Production),
            "testing" => Ok(AppEnv::Testing),
            other => Err(config::ConfigError::Message(format!(
                "FATAL: 'APP_ENV' must be one of development, production or testing (got '{}').",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    pub app_env: AppEnv,
    /// Absolute path of the SQLite file. Ignored in the testing environment.
    pub database_path: String,
    pub upload_path: String,
    pub encryption_key: Option<String>,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub use_secure_cookies: bool,
    pub max_upload_size_mb: u64,
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| {
        config::ConfigError::Message(format!(
            "FATAL: Environment variable '{}' is not set in your .env file.",
            name
        ))
    })
}

fn require_absolute(name: &str, value: &str) -> Result<(), config::ConfigError> {
    if Path::new(value).is_relative() {
        return Err(config::ConfigError::Message(format!(
            "FATAL: The '{}' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
            name, value
        )));
    }
    Ok(())
}

/// The session key must be 128 hexadecimal characters (64 bytes).
pub fn validate_session_key(key: &str) -> Result<(), config::ConfigError> {
    if key.len() != 128 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(config::ConfigError::Message(
            "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string(),
        ));
    }
    Ok(())
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;

        let app_env: AppEnv = env::var("APP_ENV").unwrap_or_default().parse()?;

        let database_path = match app_env {
            AppEnv::Testing => env::var("DATABASE_PATH").unwrap_or_default(),
            _ => {
                let path = required_var("DATABASE_PATH")?;
                require_absolute("DATABASE_PATH", &path)?;
                path
            }
        };

        let upload_path = required_var("UPLOAD_PATH")?;
        require_absolute("UPLOAD_PATH", &upload_path)?;

        let session_secret_key = required_var("SESSION_SECRET_KEY")?;
        validate_session_key(&session_secret_key)?;

        let encryption_key = env::var("ENCRYPTION_KEY").ok().filter(|k| !k.trim().is_empty());
        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);
        let max_upload_size_mb = env::var("MAX_UPLOAD_SIZE_MB")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(10);

        let mut builder = config::Config::builder()
            .set_default("web.host", "127.0.0.1")?
            .set_default("web.port", 8080)?
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml).required(false));

        if let Ok(host) = env::var("WEB_HOST") {
            builder = builder.set_override("web.host", host)?;
        }
        if let Ok(port) = env::var("WEB_PORT") {
            let port: u16 = port.trim().parse().map_err(|_| {
                config::ConfigError::Message(format!("FATAL: 'WEB_PORT' is not a valid port ('{}').", port))
            })?;
            builder = builder.set_override("web.port", i64::from(port))?;
        }
        if let Some(key) = encryption_key {
            builder = builder.set_override("encryption_key", key)?;
        }

        builder
            .set_override("app_env", app_env.as_str())?
            .set_override("database_path", database_path)?
            .set_override("upload_path", upload_path)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .set_override("max_upload_size_mb", max_upload_size_mb as i64)?
            .build()?
            .try_deserialize()
    }

    /// `None` means an in-memory database.
    pub fn database_file(&self) -> Option<PathBuf> {
        match self.app_env {
            AppEnv::Testing => None,
            _ => Some(PathBuf::from(&self.database_path)),
        }
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.max_upload_size_mb * 1024 * 1024
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_env_defaults_to_development() {
        assert_eq!("".parse::<AppEnv>().unwrap(), AppEnv::Development);
        assert_eq!("Production".parse::<AppEnv>().unwrap(), AppEnv::Production);
        assert_eq!("testing".parse::<AppEnv>().unwrap(), AppEnv::Testing);
        assert!("staging".parse::<AppEnv>().is_err());
    }

    #[test]
    fn session_key_must_be_128_hex_chars() {
        assert!(validate_session_key(&"ab".repeat(64)).is_ok());
        assert!(validate_session_key(&"ab".repeat(63)).is_err());
        assert!(validate_session_key(&"zz".repeat(64)).is_err());
    }

    #[test]
    fn relative_paths_are_rejected() {
        assert!(require_absolute("UPLOAD_PATH", "uploads").is_err());
        assert!(require_absolute("UPLOAD_PATH", "/srv/uploads").is_ok());
    }
}
