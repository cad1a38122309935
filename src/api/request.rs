use std::collections::HashMap;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{AppError, Context, Result};

use super::PortfolioRef;

const TRANSACTIONS_TEMPLATE: &str = "{api_url}/api/transactionportfolios/{scope}/{code}/transactions";
const GROUP_EXPANSION_TEMPLATE: &str = "{api_url}/api/portfoliogroups/{scope}/{code}/expansion";
const SCOPE_PORTFOLIOS_TEMPLATE: &str = "{api_url}/api/portfolios/{scope}";

/// Endpoint URL builder rooted at the configured API base URL.
#[derive(Debug, Clone)]
pub struct Endpoints {
    api_url: String,
}

impl Endpoints {
    pub fn new(api_url: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn transactions(&self, portfolio: &PortfolioRef) -> Result<String> {
        self.render(TRANSACTIONS_TEMPLATE, &portfolio.scope, Some(&portfolio.code))
    }

    /// Everything the cancellation request carries before its query string.
    pub fn cancel_prefix(&self, portfolio: &PortfolioRef) -> Result<String> {
        Ok(format!("{}?", self.transactions(portfolio)?))
    }

    pub fn group_expansion(&self, group: &PortfolioRef) -> Result<String> {
        self.render(GROUP_EXPANSION_TEMPLATE, &group.scope, Some(&group.code))
    }

    pub fn scope_portfolios(&self, scope: &str) -> Result<String> {
        self.render(SCOPE_PORTFOLIOS_TEMPLATE, scope, None)
    }

    fn render(&self, template: &str, scope: &str, code: Option<&str>) -> Result<String> {
        let mut replacements: HashMap<&str, String> = HashMap::new();
        replacements.insert("api_url", self.api_url.clone());
        replacements.insert("scope", scope.to_string());
        if let Some(code) = code {
            replacements.insert("code", code.to_string());
        }
        render_template(template, &replacements)
    }
}

fn render_template(template: &str, replacements: &HashMap<&str, String>) -> Result<String> {
    let mut result = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '{' {
            let mut key = String::new();
            let mut closed = false;
            while let Some(&next) = chars.peek() {
                chars.next();
                if next == '}' {
                    closed = true;
                    break;
                }
                key.push(next);
            }

            if !closed {
                return Err(AppError::message(format!(
                    "Unterminated placeholder in template: {{{key}"
                )));
            }

            if key.is_empty() {
                return Err(AppError::message(
                    "Encountered empty placeholder `{}` in template",
                ));
            }

            let value = replacements.get(key.as_str()).ok_or_else(|| {
                AppError::message(format!(
                    "No replacement provided for placeholder `{}` in template",
                    key
                ))
            })?;
            result.push_str(value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Expand `${NAME}` placeholders, resolving each name through `lookup`.
pub fn expand_placeholders<F>(value: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut name = String::new();
            let mut closed = false;
            while let Some(&next) = chars.peek() {
                chars.next();
                if next == '}' {
                    closed = true;
                    break;
                }
                name.push(next);
            }

            if name.is_empty() {
                return Err(AppError::message(
                    "Encountered empty environment placeholder in configuration value",
                ));
            }

            if !closed {
                return Err(AppError::message(
                    "Unterminated environment placeholder in configuration value",
                ));
            }

            let value = lookup(&name).ok_or_else(|| {
                AppError::message(format!(
                    "Environment variable {} referenced by configuration is not set",
                    name
                ))
            })?;
            result.push_str(&value);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

pub fn build_headers(headers: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes())
            .with_context(|| format!("Invalid header name: {}", key))?;
        let header_value = HeaderValue::from_str(value)
            .with_context(|| format!("Invalid header value for {}", key))?;
        map.insert(name, header_value);
    }
    Ok(map)
}
