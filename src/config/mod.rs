use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

pub mod loader;
pub mod validator;

pub use loader::{load_config, load_config_with};
pub use validator::validate_config;

pub const DEFAULT_SECRETS_FILE: &str = "secrets.json";
pub const DEFAULT_PAGE_SIZE: usize = 5000;
pub const MAX_PAGE_SIZE: usize = 5000;
pub const DEFAULT_MAX_CHARS: usize = 4000;
pub const DEFAULT_CONCURRENCY: usize = 1;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Connection and credential settings for the platform API.
#[derive(Clone, Default)]
pub struct ApiConfig {
    pub api_url: String,
    pub token_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub access_token: Option<String>,
    pub headers: HashMap<String, String>,
}

/// Fields required by the OAuth2 password grant.
#[derive(Clone)]
pub struct PasswordGrant {
    pub token_url: String,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Clone)]
pub enum Credentials {
    AccessToken(String),
    Password(PasswordGrant),
}

impl ApiConfig {
    /// A configured access token wins over the password grant.
    pub fn credentials(&self) -> Option<Credentials> {
        if let Some(token) = non_empty(&self.access_token) {
            return Some(Credentials::AccessToken(token.to_string()));
        }

        Some(Credentials::Password(PasswordGrant {
            token_url: non_empty(&self.token_url)?.to_string(),
            username: non_empty(&self.username)?.to_string(),
            password: non_empty(&self.password)?.to_string(),
            client_id: non_empty(&self.client_id)?.to_string(),
            client_secret: non_empty(&self.client_secret)?.to_string(),
        }))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_url", &self.api_url)
            .field("token_url", &self.token_url)
            .field("username", &self.username)
            .field("client_id", &self.client_id)
            .field("has_access_token", &self.access_token.is_some())
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Tuning for the flush and export commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushConfig {
    pub page_size: usize,
    pub max_chars: usize,
    pub concurrency: usize,
    pub timeout_secs: u64,
}

impl Default for FlushConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_chars: DEFAULT_MAX_CHARS,
            concurrency: DEFAULT_CONCURRENCY,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl FlushConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub api: ApiConfig,
    pub flush: FlushConfig,
}
