use std::{collections::HashMap, fs, path::Path};

use serde::Deserialize;

use crate::api::request::expand_placeholders;
use crate::error::{AppError, Context, Result};

use super::{ApiConfig, Config, FlushConfig, DEFAULT_SECRETS_FILE};

pub const ENV_API_URL: &str = "PLATFORM_API_URL";
pub const ENV_TOKEN_URL: &str = "PLATFORM_TOKEN_URL";
pub const ENV_USERNAME: &str = "PLATFORM_USERNAME";
pub const ENV_PASSWORD: &str = "PLATFORM_PASSWORD";
pub const ENV_CLIENT_ID: &str = "PLATFORM_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "PLATFORM_CLIENT_SECRET";
pub const ENV_ACCESS_TOKEN: &str = "PLATFORM_ACCESS_TOKEN";

/// Load configuration from the secrets file and the process environment.
///
/// An explicitly named file must exist; the default `secrets.json` is optional
/// so that a fully environment-driven setup works without one. The result is not
/// validated here: callers apply command-line overrides first and then run
/// [`validate_config`](super::validate_config).
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    load_config_with(path, |name| std::env::var(name).ok())
}

/// Same as [`load_config`] with an injectable environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = match path {
        Some(path) => read_raw_config(path)?,
        None => {
            let default_path = Path::new(DEFAULT_SECRETS_FILE);
            if default_path.exists() {
                read_raw_config(default_path)?
            } else {
                log::debug!("No {DEFAULT_SECRETS_FILE} found, using environment only");
                RawConfig::default()
            }
        }
    };

    let mut config = raw.into_config(&lookup)?;
    apply_env_overrides(&mut config.api, &lookup);

    Ok(config)
}

fn read_raw_config(path: &Path) -> Result<RawConfig> {
    if !path.exists() {
        return Err(AppError::message(format!(
            "secrets file not found: {}",
            path.display()
        )));
    }

    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read secrets file at {}", path.display()))?;

    let raw: RawConfig = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse secrets file at {}", path.display()))?;

    Ok(raw)
}

fn apply_env_overrides<F>(api: &mut ApiConfig, lookup: &F)
where
    F: Fn(&str) -> Option<String>,
{
    let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(url) = value(ENV_API_URL) {
        api.api_url = url;
    }

    let optional_overrides: [(&str, &mut Option<String>); 6] = [
        (ENV_TOKEN_URL, &mut api.token_url),
        (ENV_USERNAME, &mut api.username),
        (ENV_PASSWORD, &mut api.password),
        (ENV_CLIENT_ID, &mut api.client_id),
        (ENV_CLIENT_SECRET, &mut api.client_secret),
        (ENV_ACCESS_TOKEN, &mut api.access_token),
    ];

    for (name, slot) in optional_overrides {
        if let Some(v) = value(name) {
            *slot = Some(v);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    api: RawApiConfig,
    #[serde(default)]
    flush: RawFlushConfig,
}

impl RawConfig {
    fn into_config<F>(self, lookup: &F) -> Result<Config>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Config {
            api: self.api.into_api_config(lookup)?,
            flush: self.flush.into_flush_config(),
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawApiConfig {
    #[serde(default)]
    api_url: String,
    token_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    access_token: Option<String>,
    #[serde(default)]
    headers: HashMap<String, String>,
}

impl RawApiConfig {
    fn into_api_config<F>(self, lookup: &F) -> Result<ApiConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let expand = |value: Option<String>| -> Result<Option<String>> {
            value
                .map(|v| expand_placeholders(&v, lookup))
                .transpose()
        };

        let headers = self
            .headers
            .into_iter()
            .map(|(name, value)| -> Result<(String, String)> {
                Ok((name, expand_placeholders(&value, lookup)?))
            })
            .collect::<Result<HashMap<_, _>>>()?;

        Ok(ApiConfig {
            api_url: expand_placeholders(&self.api_url, lookup)?,
            token_url: expand(self.token_url)?,
            username: expand(self.username)?,
            password: expand(self.password)?,
            client_id: expand(self.client_id)?,
            client_secret: expand(self.client_secret)?,
            access_token: expand(self.access_token)?,
            headers,
        })
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawFlushConfig {
    page_size: Option<usize>,
    max_chars: Option<usize>,
    concurrency: Option<usize>,
    timeout_secs: Option<u64>,
}

impl RawFlushConfig {
    fn into_flush_config(self) -> FlushConfig {
        let defaults = FlushConfig::default();
        FlushConfig {
            page_size: self.page_size.unwrap_or(defaults.page_size),
            max_chars: self.max_chars.unwrap_or(defaults.max_chars),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
        }
    }
}
