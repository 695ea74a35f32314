use std::{env, fmt, net::SocketAddr, time::Duration};

use url::Url;

use super::server_bind_address;

pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000/api/";
pub const DEFAULT_REFRESH_PATH: &str = "auth/refresh";
pub const DEFAULT_LOGIN_PATH: &str = "auth/login";
pub const DEFAULT_SYSTEM_ROLE: &str = "admin";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://catalog-admin.db?mode=rwc";
pub const DEFAULT_LOCALE: &str = "en";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    /// Catalog backend root. Always ends with `/` so relative paths join below it.
    pub api_base_url: Url,
    pub auth_refresh_path: String,
    pub auth_login_path: String,
    pub auth_system_role: String,
    pub database_url: String,
    pub catalog_locale: String,
    pub http_timeout: Duration,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;

        let api_base_url = parse_base_url(&var_or("API_BASE_URL", DEFAULT_API_BASE_URL))?;
        let http_timeout = parse_timeout(&var_or(
            "HTTP_TIMEOUT_SECS",
            &DEFAULT_HTTP_TIMEOUT_SECS.to_string(),
        ))?;

        Ok(Self {
            bind_addr,
            environment,
            api_base_url,
            auth_refresh_path: non_empty("AUTH_REFRESH_PATH", DEFAULT_REFRESH_PATH)?,
            auth_login_path: non_empty("AUTH_LOGIN_PATH", DEFAULT_LOGIN_PATH)?,
            auth_system_role: non_empty("AUTH_SYSTEM_ROLE", DEFAULT_SYSTEM_ROLE)?,
            database_url: non_empty("DATABASE_URL", DEFAULT_DATABASE_URL)?,
            catalog_locale: non_empty("CATALOG_LOCALE", DEFAULT_LOCALE)?,
            http_timeout,
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn non_empty(name: &'static str, default: &str) -> Result<String, ConfigError> {
    let value = var_or(name, default);
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Empty(name));
    }
    Ok(trimmed.to_string())
}

fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let mut url =
        Url::parse(value).map_err(|err| ConfigError::ApiBaseUrl(value.to_string(), err))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::HttpTimeout(value.to_string())),
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    ApiBaseUrl(String, url::ParseError),
    HttpTimeout(String),
    Empty(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::ApiBaseUrl(value, err) => {
                write!(f, "invalid API_BASE_URL value '{value}': {err}")
            }
            Self::HttpTimeout(value) => write!(
                f,
                "HTTP_TIMEOUT_SECS must be a positive integer (got {value})"
            ),
            Self::Empty(name) => write!(f, "{name} must not be empty"),
        }
    }
}

impl std::error::Error for ConfigError {}
