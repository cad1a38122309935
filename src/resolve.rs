use std::fmt;

use crate::api::model::validate_identifier;
use crate::api::{ExpandedGroup, PortfolioApi, PortfolioRef};
use crate::error::{AppError, Result};
use crate::flush::paginator;
use crate::report::Reporter;

/// Which portfolios an operation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortfolioSelector {
    Single(PortfolioRef),
    /// Every portfolio reachable from the group, sub-groups included.
    Group(PortfolioRef),
    /// Every portfolio registered under the scope.
    Scope(String),
}

impl PortfolioSelector {
    /// Build a selector from command-line style arguments.
    ///
    /// `all_in_scope` wins over `code`; otherwise `code` names a portfolio, or a
    /// group when `group` is set.
    pub fn from_args(scope: &str, code: Option<&str>, group: bool, all_in_scope: bool) -> Result<Self> {
        if all_in_scope {
            validate_identifier("scope", scope)?;
            return Ok(Self::Scope(scope.to_string()));
        }

        let code = code.ok_or_else(|| {
            AppError::message("a portfolio code is required unless --all-in-scope is given")
        })?;
        let target = PortfolioRef::new(scope, code)?;

        Ok(if group {
            Self::Group(target)
        } else {
            Self::Single(target)
        })
    }
}

impl fmt::Display for PortfolioSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(portfolio) => write!(f, "portfolio {portfolio}"),
            Self::Group(group) => write!(f, "portfolio group {group}"),
            Self::Scope(scope) => write!(f, "scope {scope}"),
        }
    }
}

/// Expand `selector` into the concrete portfolios to process.
///
/// A missing group or an empty scope resolves to nothing rather than an error.
pub fn resolve_portfolios(
    api: &dyn PortfolioApi,
    selector: &PortfolioSelector,
    page_size: usize,
    reporter: &dyn Reporter,
) -> Result<Vec<PortfolioRef>> {
    let portfolios = match selector {
        PortfolioSelector::Single(portfolio) => vec![portfolio.clone()],
        PortfolioSelector::Group(group) => match api.expand_group(group)? {
            Some(expanded) => flatten_group(&expanded),
            None => {
                reporter.info(&format!("Portfolio group {group} could not be found"));
                Vec::new()
            }
        },
        PortfolioSelector::Scope(scope) => {
            paginator::scope_portfolios(api, scope, page_size).collect_values()?
        }
    };

    if portfolios.is_empty() {
        reporter.info(&format!("No portfolios found for {selector}"));
    } else {
        reporter.info(&format!(
            "Resolved {} portfolio(s) for {selector}",
            portfolios.len()
        ));
    }

    Ok(portfolios)
}

/// Depth first: the group's own portfolios, then each sub-group in listed order.
///
/// A sub-group reachable along several paths contributes its portfolios once per path.
pub fn flatten_group(group: &ExpandedGroup) -> Vec<PortfolioRef> {
    let mut portfolios = group.portfolios.clone();
    for sub_group in &group.sub_groups {
        portfolios.extend(flatten_group(sub_group));
    }
    portfolios
}
