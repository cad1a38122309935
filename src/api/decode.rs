use serde::Deserialize;

use crate::error::{Context, Result};

use super::{ExpandedGroup, Page, PortfolioRef, TransactionRecord};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
struct RawResourceList<T> {
    #[serde(default)]
    values: Vec<T>,
    #[serde(default)]
    next_page: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawResourceId {
    scope: String,
    code: String,
}

impl RawResourceId {
    fn into_portfolio_ref(self) -> Result<PortfolioRef> {
        PortfolioRef::new(self.scope, self.code)
    }
}

#[derive(Debug, Deserialize)]
struct RawPortfolio {
    id: RawResourceId,
}

#[derive(Debug, Deserialize)]
struct RawMoney {
    #[serde(default)]
    amount: f64,
    #[serde(default)]
    currency: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTransaction {
    transaction_id: String,
    #[serde(rename = "type", default)]
    transaction_type: String,
    #[serde(default)]
    transaction_date: String,
    #[serde(default)]
    settlement_date: String,
    #[serde(default)]
    units: f64,
    #[serde(default)]
    total_consideration: Option<RawMoney>,
    #[serde(default)]
    instrument_uid: String,
}

impl RawTransaction {
    fn into_record(self) -> TransactionRecord {
        let (amount, currency) = match self.total_consideration {
            Some(money) => (money.amount, money.currency),
            None => (0.0, String::new()),
        };

        TransactionRecord {
            transaction_id: self.transaction_id,
            transaction_type: self.transaction_type,
            transaction_date: self.transaction_date,
            settlement_date: self.settlement_date,
            units: self.units,
            amount,
            currency,
            instrument_uid: self.instrument_uid,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExpandedGroup {
    id: RawResourceId,
    #[serde(default)]
    values: Vec<RawPortfolio>,
    #[serde(default)]
    sub_groups: Vec<RawExpandedGroup>,
}

impl RawExpandedGroup {
    fn into_group(self) -> Result<ExpandedGroup> {
        let portfolios = self
            .values
            .into_iter()
            .map(|portfolio| portfolio.id.into_portfolio_ref())
            .collect::<Result<Vec<_>>>()?;
        let sub_groups = self
            .sub_groups
            .into_iter()
            .map(RawExpandedGroup::into_group)
            .collect::<Result<Vec<_>>>()?;

        Ok(ExpandedGroup {
            id: self.id.into_portfolio_ref()?,
            portfolios,
            sub_groups,
        })
    }
}

pub fn decode_transactions_page(body: &str) -> Result<Page<TransactionRecord>> {
    let raw: RawResourceList<RawTransaction> =
        serde_json::from_str(body).context("Failed to parse transactions page")?;

    Ok(Page::new(
        raw.values.into_iter().map(RawTransaction::into_record).collect(),
        raw.next_page,
    ))
}

pub fn decode_portfolios_page(body: &str) -> Result<Page<PortfolioRef>> {
    let raw: RawResourceList<RawPortfolio> =
        serde_json::from_str(body).context("Failed to parse portfolio listing page")?;

    let values = raw
        .values
        .into_iter()
        .map(|portfolio| portfolio.id.into_portfolio_ref())
        .collect::<Result<Vec<_>>>()?;

    Ok(Page::new(values, raw.next_page))
}

pub fn decode_group_expansion(body: &str) -> Result<ExpandedGroup> {
    let raw: RawExpandedGroup =
        serde_json::from_str(body).context("Failed to parse portfolio group expansion")?;
    raw.into_group()
}
