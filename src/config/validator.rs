use reqwest::Url;

use crate::error::{AppError, Result};

use super::{ApiConfig, Config, FlushConfig, MAX_PAGE_SIZE};

/// Validate the loaded configuration and surface every issue at once.
pub fn validate_config(config: &Config) -> Result<()> {
    let mut issues = Vec::new();

    validate_api(&config.api, &mut issues);
    validate_flush(&config.flush, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::Config(issues))
    }
}

fn validate_api(api: &ApiConfig, issues: &mut Vec<String>) {
    validate_url("api.apiUrl", &api.api_url, issues);

    if let Some(token_url) = api.token_url.as_deref().filter(|url| !url.trim().is_empty()) {
        validate_url("api.tokenUrl", token_url, issues);
    }

    if api.credentials().is_none() {
        issues.push(
            "no usable credentials: set api.accessToken, or all of api.tokenUrl, api.username, \
             api.password, api.clientId and api.clientSecret"
                .to_string(),
        );
    }
}

fn validate_url(field: &str, value: &str, issues: &mut Vec<String>) {
    if value.trim().is_empty() {
        issues.push(format!("{field} must not be empty"));
        return;
    }

    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => issues.push(format!(
            "{field} must use http or https, found `{}`",
            url.scheme()
        )),
        Err(err) => issues.push(format!("{field} `{value}` is not a valid URL: {err}")),
    }
}

fn validate_flush(flush: &FlushConfig, issues: &mut Vec<String>) {
    if flush.page_size == 0 || flush.page_size > MAX_PAGE_SIZE {
        issues.push(format!(
            "flush.pageSize must be between 1 and {MAX_PAGE_SIZE}, found {}",
            flush.page_size
        ));
    }

    if flush.max_chars == 0 {
        issues.push("flush.maxChars must be greater than zero".to_string());
    }

    if flush.concurrency == 0 {
        issues.push("flush.concurrency must be at least 1".to_string());
    }
}
