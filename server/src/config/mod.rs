use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, WardrobeError};

const ENV_PREFIX: &str = "WARDROBE";
const MIN_JWT_SECRET_LEN: usize = 32;
const MAX_TOKEN_TTL_HOURS: u64 = 24 * 365;
const MAX_UNDERUSED_AFTER_DAYS: i64 = 3650;

/// A configuration value that must never show up in logs.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(***)")
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: HttpConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub images: ImageConfig,
    pub ai: AiConfig,
    pub analytics: AnalyticsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Mongodb,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub uri: Secret,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: Secret,
    pub token_ttl_hours: u64,
    pub bcrypt_cost: u32,
    pub secure_cookie: bool,
    pub rate_limit_attempts: usize,
    pub rate_limit_window_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub cloudinary_cloud_name: String,
    pub cloudinary_api_key: Secret,
    pub cloudinary_api_secret: Secret,
    pub folder: String,
    pub photoroom_api_key: Secret,
    pub photoroom_endpoint: String,
    pub fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub endpoint: String,
    pub model: String,
    pub api_keys: Vec<Secret>,
    pub referer: String,
    pub title: String,
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub default_retry_after_secs: u64,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub underused_after_days: i64,
    pub underused_limit: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Mongodb,
            uri: Secret::default(),
            name: "wardrobe".to_string(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: Secret::default(),
            token_ttl_hours: 24,
            bcrypt_cost: 10,
            secure_cookie: false,
            rate_limit_attempts: 10,
            rate_limit_window_secs: 60,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            cloudinary_cloud_name: String::new(),
            cloudinary_api_key: Secret::default(),
            cloudinary_api_secret: Secret::default(),
            folder: "wardrobe".to_string(),
            photoroom_api_key: Secret::default(),
            photoroom_endpoint: "https://sdk.photoroom.com/v1/segment".to_string(),
            fetch_timeout_secs: 30,
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            model: "google/gemini-2.0-flash-thinking-exp-1219:free".to_string(),
            api_keys: Vec::new(),
            referer: "http://localhost:8080".to_string(),
            title: "Fashion AI Wardrobe Assistant".to_string(),
            max_attempts: 3,
            base_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            default_retry_after_secs: 10,
            request_timeout_secs: 60,
        }
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            underused_after_days: 90,
            underused_limit: 5,
        }
    }
}

impl AppConfig {
    /// Layers an optional TOML file under `WARDROBE__SECTION__KEY` environment
    /// variables. A missing file is not an error; a malformed one is.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            let path = path.as_ref().to_string_lossy().into_owned();
            builder = builder
                .add_source(config::File::new(&path, config::FileFormat::Toml).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ai.api_keys"),
        );

        let config: AppConfig = builder
            .build()
            .and_then(|raw| raw.try_deserialize())
            .map_err(|e| WardrobeError::Config(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)
            .map_err(|e| WardrobeError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.expose().len() < MIN_JWT_SECRET_LEN {
            return Err(WardrobeError::Config(format!(
                "auth.jwt_secret must be at least {} bytes",
                MIN_JWT_SECRET_LEN
            )));
        }

        if self.database.backend == StorageBackend::Mongodb && self.database.uri.is_empty() {
            return Err(WardrobeError::Config(
                "database.uri is required for the mongodb backend".to_string(),
            ));
        }

        if !(4..=31).contains(&self.auth.bcrypt_cost) {
            return Err(WardrobeError::Config(
                "auth.bcrypt_cost must be between 4 and 31".to_string(),
            ));
        }

        if self.ai.max_attempts == 0 {
            return Err(WardrobeError::Config(
                "ai.max_attempts must be at least 1".to_string(),
            ));
        }

        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.auth.token_ttl_hours) {
            return Err(WardrobeError::Config(format!(
                "auth.token_ttl_hours must be between 1 and {}",
                MAX_TOKEN_TTL_HOURS
            )));
        }

        if !(1..=MAX_UNDERUSED_AFTER_DAYS).contains(&self.analytics.underused_after_days) {
            return Err(WardrobeError::Config(format!(
                "analytics.underused_after_days must be between 1 and {}",
                MAX_UNDERUSED_AFTER_DAYS
            )));
        }

        Ok(())
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.auth.token_ttl_hours * 3600)
    }
}

impl AiConfig {
    /// Keys in failover order, blanks dropped.
    pub fn usable_keys(&self) -> Vec<Secret> {
        self.api_keys
            .iter()
            .filter(|key| !key.is_empty())
            .cloned()
            .collect()
    }
}
