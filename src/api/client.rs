use std::time::Duration;

use chrono::SecondsFormat;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION};

use crate::config::ApiConfig;
use crate::error::{AppError, Context, Result};
use crate::flush::batcher::TRANSACTION_ID_PARAM;

use super::decode::{decode_group_expansion, decode_portfolios_page, decode_transactions_page};
use super::request::{build_headers, Endpoints};
use super::{
    ExpandedGroup, Page, PortfolioApi, PortfolioRef, TokenProvider, TransactionApi,
    TransactionQuery, TransactionRecord,
};

/// Blocking client for the platform REST API.
pub struct RestClient {
    http: Client,
    endpoints: Endpoints,
    headers: HeaderMap,
    tokens: TokenProvider,
}

impl RestClient {
    pub fn new(api: &ApiConfig, timeout: Duration) -> Result<Self> {
        let http = build_blocking_client(timeout)?;
        let tokens = TokenProvider::new(api, http.clone())?;

        Ok(Self {
            endpoints: Endpoints::new(&api.api_url),
            headers: build_headers(&api.headers)?,
            http,
            tokens,
        })
    }

    /// Attach auth and extra headers, send, and return the body of a successful response.
    fn execute(&self, method: &'static str, url: &str, builder: RequestBuilder) -> Result<String> {
        let token = self.tokens.token()?;

        let response = builder
            .headers(self.headers.clone())
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .header(ACCEPT, "application/json")
            .send()
            .with_context(|| format!("{method} {url} failed"))?;

        let status = response.status();
        let body = response
            .text()
            .with_context(|| format!("Failed to read response body of {method} {url}"))?;

        if !status.is_success() {
            return Err(AppError::Service {
                method,
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

impl TransactionApi for RestClient {
    fn list_transactions(
        &self,
        portfolio: &PortfolioRef,
        query: &TransactionQuery,
        cursor: Option<&str>,
    ) -> Result<Page<TransactionRecord>> {
        let url = self.endpoints.transactions(portfolio)?;

        let mut params = vec![
            (
                "fromTransactionDate",
                query.window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (
                "toTransactionDate",
                query.window.end.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("limit", query.page_size.to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("page", cursor.to_string()));
        }

        let body = self.execute("GET", &url, self.http.get(&url).query(&params))?;
        decode_transactions_page(&body)
    }

    fn cancel_url_prefix(&self, portfolio: &PortfolioRef) -> Result<String> {
        self.endpoints.cancel_prefix(portfolio)
    }

    fn cancel_transactions(&self, portfolio: &PortfolioRef, transaction_ids: &[String]) -> Result<()> {
        let url = self.endpoints.transactions(portfolio)?;
        let params: Vec<(&str, &str)> = transaction_ids
            .iter()
            .map(|id| (TRANSACTION_ID_PARAM, id.as_str()))
            .collect();

        self.execute("DELETE", &url, self.http.delete(&url).query(&params))?;
        Ok(())
    }
}

impl PortfolioApi for RestClient {
    fn expand_group(&self, group: &PortfolioRef) -> Result<Option<ExpandedGroup>> {
        let url = self.endpoints.group_expansion(group)?;

        match self.execute("GET", &url, self.http.get(&url)) {
            Ok(body) => decode_group_expansion(&body).map(Some),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn list_portfolios(
        &self,
        scope: &str,
        page_size: usize,
        cursor: Option<&str>,
    ) -> Result<Page<PortfolioRef>> {
        let url = self.endpoints.scope_portfolios(scope)?;

        let mut params = vec![("limit", page_size.to_string())];
        if let Some(cursor) = cursor {
            params.push(("page", cursor.to_string()));
        }

        match self.execute("GET", &url, self.http.get(&url).query(&params)) {
            Ok(body) => decode_portfolios_page(&body),
            Err(err) if err.is_not_found() => Ok(Page::last(Vec::new())),
            Err(err) => Err(err),
        }
    }
}

fn build_blocking_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .build()
        .context("Failed to construct blocking HTTP client")?)
}
