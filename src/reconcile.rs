//! Refresh-cycle reconciliation
//!
//! Joins the three provider sources into one [`Aggregate`]:
//!
//! - the account listing, flattened to properties keyed by consumer id
//! - per-property usage and rates, fetched independently per property
//! - the interval report, keyed by ICP and matched against each property's
//!   connection number
//!
//! Only the account listing (and the token login behind it) can fail a
//! cycle. Per-property failures become error markers or empty rates, and a
//! missing or unparseable report becomes an empty element map for everyone.

use crate::aggregate::{
    Aggregate, ElementDay, ElementMap, Property, PropertyFetch, RateSummary, UsageResult, assemble,
};
use crate::api::{AccountsEnvelope, PowershopClient, RatesEnvelope, ReportWindow, UsageWindow};
use crate::config::{Config, ReportConfig};
use crate::error::{FetchFailure, Result};
use crate::logging::get_logger;
use crate::report::{TabularRow, parse_report};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// ICP -> element -> date -> kWh values
pub type ReportIndex = HashMap<String, BTreeMap<String, BTreeMap<NaiveDate, Vec<f64>>>>;

/// Flatten accounts into properties, skipping entries without a consumer id
///
/// A consumer id listed under more than one account is kept once, with the
/// first account's details.
pub fn flatten_properties(accounts: &AccountsEnvelope) -> Vec<Property> {
    let mut seen = HashSet::new();
    let mut properties = Vec::new();
    for account in &accounts.data.accounts {
        for prop in &account.properties {
            let Some(consumer_id) = prop.consumer_id.clone() else {
                continue;
            };
            if !seen.insert(consumer_id.clone()) {
                continue;
            }
            properties.push(Property {
                consumer_id,
                name: prop.name.clone(),
                connection_number: prop.connection_number.clone(),
                account_number: account.number.clone(),
                account_name: account.name.clone(),
            });
        }
    }
    properties
}

/// Current-month tax-inclusive special rate in dollars
///
/// Uses the first special entry with a meter number; its month list must
/// contain `month_label` and the first `incl` price is converted from cents.
pub fn extract_special_rate(rates: &RatesEnvelope, month_label: &str) -> Option<f64> {
    let special = rates
        .data
        .rates
        .special
        .iter()
        .find(|s| s.meter_number.as_deref().is_some_and(|m| !m.is_empty()))?;
    let month = special
        .rates
        .iter()
        .find(|r| r.month.as_deref().map(str::trim) == Some(month_label))?;
    let cents = month.incl.first().copied().flatten()?;
    Some(cents / 100.0)
}

/// Group report rows by ICP, element and date; later rows replace earlier ones
pub fn index_report(rows: &[TabularRow]) -> ReportIndex {
    let mut index = ReportIndex::new();
    for row in rows {
        let Some(date) = row.date else {
            continue;
        };
        index
            .entry(row.icp.clone())
            .or_default()
            .entry(row.element.clone())
            .or_default()
            .insert(date, row.values.clone());
    }
    index
}

/// kWh to Wh, rounded to 3 decimals
pub fn kwh_to_wh(kwh: f64) -> f64 {
    (kwh * 1_000_000.0).round() / 1000.0
}

/// Element series for one connection number; empty when the ICP is unknown
pub fn element_series_for(index: &ReportIndex, connection_number: Option<&str>) -> ElementMap {
    let Some(by_element) = connection_number.and_then(|icp| index.get(icp.trim())) else {
        return ElementMap::new();
    };
    by_element
        .iter()
        .map(|(element, days)| {
            let series = days
                .iter()
                .map(|(date, values)| ElementDay {
                    date: *date,
                    usage: values.iter().copied().map(kwh_to_wh).collect(),
                })
                .collect();
            (element.clone(), series)
        })
        .collect()
}

/// Runs refresh cycles against a [`PowershopClient`]
pub struct Reconciler {
    client: Arc<PowershopClient>,
    tz: Tz,
    usage_window_days: u32,
    report: ReportConfig,
    max_concurrent_fetches: usize,
    logger: crate::logging::StructuredLogger,
}

impl Reconciler {
    pub fn new(client: Arc<PowershopClient>, config: &Config) -> Result<Self> {
        Ok(Self {
            client,
            tz: config.tz()?,
            usage_window_days: config.usage_window_days,
            report: config.report.clone(),
            max_concurrent_fetches: config.max_concurrent_fetches.max(1),
            logger: get_logger("reconcile"),
        })
    }

    pub fn client(&self) -> &Arc<PowershopClient> {
        &self.client
    }

    /// Provider-local calendar day
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }

    /// Run one cycle for the provider-local current day
    pub async fn refresh(&self) -> Result<Aggregate> {
        self.refresh_on(self.today()).await
    }

    /// Run one cycle as if `today` were the current day
    pub async fn refresh_on(&self, today: NaiveDate) -> Result<Aggregate> {
        let accounts = self.client.get_accounts().await?;
        let properties = flatten_properties(&accounts);
        self.logger
            .info(&format!("Account listing returned {} properties", properties.len()));

        let month_label = today.format("%b").to_string();
        let window = UsageWindow::ending_tomorrow(today, self.usage_window_days);
        let fetched: Vec<(Property, UsageResult, RateSummary)> =
            futures::stream::iter(properties)
                .map(|property| self.fetch_property(property, &window, &month_label))
                .buffered(self.max_concurrent_fetches)
                .collect()
                .await;

        let rows = self.fetch_report(today).await;
        let index = index_report(&rows);

        let fetches = fetched
            .into_iter()
            .map(|(property, usage, rate)| {
                let elements = element_series_for(&index, property.connection_number.as_deref());
                PropertyFetch {
                    property,
                    usage,
                    rate,
                    elements,
                }
            })
            .collect();

        let aggregate = assemble(fetches);
        self.logger.info(&format!(
            "Refresh complete: {} properties, {} usage failures, {} report rows",
            aggregate.properties.len(),
            aggregate.failed_usage_count(),
            rows.len()
        ));
        Ok(aggregate)
    }

    async fn fetch_property(
        &self,
        property: Property,
        window: &UsageWindow,
        month_label: &str,
    ) -> (Property, UsageResult, RateSummary) {
        let logger = self.logger.for_property(&property.consumer_id);

        let usage = match self.client.get_usage(&property.consumer_id, window).await {
            Ok(record) => Ok(record),
            Err(e) => {
                logger.warn(&format!("Usage fetch failed: {}", e));
                Err(FetchFailure::from(e))
            }
        };

        let special = match self.client.get_rates(&property.consumer_id).await {
            Ok(rates) => extract_special_rate(&rates, month_label),
            Err(e) => {
                logger.warn(&format!("Rate fetch failed: {}", e));
                None
            }
        };

        let rate = RateSummary {
            month_label: month_label.to_string(),
            special_incl_dollars_current_month: special,
        };
        (property, usage, rate)
    }

    /// Report rows for the trailing window; any failure yields no rows
    async fn fetch_report(&self, today: NaiveDate) -> Vec<TabularRow> {
        if !self.report.enabled {
            return Vec::new();
        }
        let window = ReportWindow::trailing(today, self.report.window_days);
        let text = match self.client.get_usage_report(&window).await {
            Ok(text) => text,
            Err(e) => {
                self.logger
                    .warn(&format!("Usage report unavailable this cycle: {}", e));
                return Vec::new();
            }
        };
        match parse_report(&text) {
            Ok(rows) => rows,
            Err(e) => {
                self.logger
                    .warn(&format!("Usage report could not be parsed: {}", e));
                Vec::new()
            }
        }
    }
}
