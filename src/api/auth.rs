use std::fmt::Debug;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::config::{ApiConfig, Credentials, PasswordGrant};
use crate::error::{AppError, Context, Result};

const TOKEN_MARGIN: Duration = Duration::from_secs(120);
const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;
const PASSWORD_GRANT_SCOPE: &str = "openid client offline_access";

struct TokenState {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Instant,
}

impl TokenState {
    fn from_response(
        response: TokenResponse,
        previous_refresh: Option<&str>,
        now: Instant,
    ) -> Self {
        let lifetime = response.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Self {
            access_token: response.access_token,
            refresh_token: response
                .refresh_token
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at: now + Duration::from_secs(lifetime),
        }
    }

    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at > now + TOKEN_MARGIN
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Hands out a bearer token, refreshing it shortly before it expires.
pub struct TokenProvider {
    credentials: Credentials,
    client: Client,
    state: Mutex<Option<TokenState>>,
}

impl TokenProvider {
    pub fn new(api: &ApiConfig, client: Client) -> Result<Self> {
        let credentials = api
            .credentials()
            .ok_or_else(|| AppError::message("No usable API credentials configured"))?;

        Ok(Self {
            credentials,
            client,
            state: Mutex::new(None),
        })
    }

    /// Return a token valid for at least the refresh margin.
    pub fn token(&self) -> Result<String> {
        let grant = match &self.credentials {
            Credentials::AccessToken(token) => return Ok(token.clone()),
            Credentials::Password(grant) => grant,
        };

        let mut guard = self
            .state
            .lock()
            .map_err(|_| AppError::message("Failed to lock API token cache"))?;

        let now = Instant::now();

        if let Some(state) = guard.as_ref() {
            if state.is_fresh(now) {
                return Ok(state.access_token.clone());
            }
        }

        let current_refresh = guard.as_ref().and_then(|state| state.refresh_token.clone());

        let new_state = match current_refresh {
            Some(refresh_token) => match self.refresh(grant, &refresh_token) {
                Ok(state) => state,
                Err(err) => {
                    log::warn!("Failed to refresh API token: {}", err);
                    self.authenticate(grant)?
                }
            },
            None => self.authenticate(grant)?,
        };

        let token = new_state.access_token.clone();
        *guard = Some(new_state);
        Ok(token)
    }

    fn authenticate(&self, grant: &PasswordGrant) -> Result<TokenState> {
        log::debug!("Requesting API token for {}", grant.username);
        let response = self.request_token(
            grant,
            &[
                ("grant_type", "password"),
                ("username", grant.username.as_str()),
                ("password", grant.password.as_str()),
                ("scope", PASSWORD_GRANT_SCOPE),
                ("client_id", grant.client_id.as_str()),
                ("client_secret", grant.client_secret.as_str()),
            ],
        )?;
        Ok(TokenState::from_response(response, None, Instant::now()))
    }

    fn refresh(&self, grant: &PasswordGrant, refresh_token: &str) -> Result<TokenState> {
        log::debug!("Refreshing API token");
        let response = self.request_token(
            grant,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", grant.client_id.as_str()),
                ("client_secret", grant.client_secret.as_str()),
            ],
        )?;
        Ok(TokenState::from_response(
            response,
            Some(refresh_token),
            Instant::now(),
        ))
    }

    fn request_token(&self, grant: &PasswordGrant, form: &[(&str, &str)]) -> Result<TokenResponse> {
        let response = self
            .client
            .post(&grant.token_url)
            .form(form)
            .send()
            .context("Failed to request API token")?
            .error_for_status()
            .context("API token request was rejected")?;

        let parsed: TokenResponse = response
            .json()
            .context("Failed to parse API token response")?;

        Ok(parsed)
    }
}

impl Debug for TokenState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenState")
            .field("expires_at", &self.expires_at)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}
