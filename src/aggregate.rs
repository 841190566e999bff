//! Normalized refresh-cycle output
//!
//! [`Aggregate`] is rebuilt from scratch every cycle. Every map is keyed by
//! the consumer ids of [`Aggregate::properties`], and every property has an
//! entry in each map, even when its fetches failed or the report had no
//! rows for it.

use crate::api::UsageRecord;
use crate::error::FetchFailure;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Usage fetch outcome for one property
pub type UsageResult = std::result::Result<UsageRecord, FetchFailure>;

/// Element label ("Controlled", "Uncontrolled", ...) to its day series
pub type ElementMap = BTreeMap<String, ElementSeries>;

/// Date-ascending days for one metering element
pub type ElementSeries = Vec<ElementDay>;

/// A property flattened out of the account listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub consumer_id: String,
    pub name: Option<String>,
    pub connection_number: Option<String>,
    pub account_number: Option<String>,
    pub account_name: Option<String>,
}

impl Property {
    /// Name for display, falling back to the consumer id
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Property {}", self.consumer_id))
    }
}

/// Current-month special rate; `None` means no rate this cycle, not an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSummary {
    pub month_label: String,
    pub special_incl_dollars_current_month: Option<f64>,
}

/// One day of half-hourly usage in Wh
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementDay {
    pub date: NaiveDate,
    pub usage: Vec<f64>,
}

/// Everything fetched for one property in one cycle
#[derive(Debug, Clone)]
pub struct PropertyFetch {
    pub property: Property,
    pub usage: UsageResult,
    pub rate: RateSummary,
    pub elements: ElementMap,
}

/// Final per-cycle result handed to downstream consumers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub properties: Vec<Property>,
    pub usages: BTreeMap<String, UsageResult>,
    pub rates: BTreeMap<String, RateSummary>,
    pub elements: BTreeMap<String, ElementMap>,
}

impl Aggregate {
    pub fn property(&self, consumer_id: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.consumer_id == consumer_id)
    }

    /// Whether every map key is a known consumer id and every property has an entry in each map
    pub fn is_consistent(&self) -> bool {
        let ids: std::collections::BTreeSet<&str> = self
            .properties
            .iter()
            .map(|p| p.consumer_id.as_str())
            .collect();
        let keys_match = |keys: Vec<&str>| {
            keys.len() == ids.len() && keys.iter().all(|k| ids.contains(k))
        };
        keys_match(self.usages.keys().map(String::as_str).collect())
            && keys_match(self.rates.keys().map(String::as_str).collect())
            && keys_match(self.elements.keys().map(String::as_str).collect())
    }

    pub fn failed_usage_count(&self) -> usize {
        self.usages.values().filter(|u| u.is_err()).count()
    }
}

/// Shape per-property results into the final [`Aggregate`]
pub fn assemble(fetches: Vec<PropertyFetch>) -> Aggregate {
    let mut aggregate = Aggregate::default();
    for fetch in fetches {
        let id = fetch.property.consumer_id.clone();
        aggregate.usages.insert(id.clone(), fetch.usage);
        aggregate.rates.insert(id.clone(), fetch.rate);
        aggregate.elements.insert(id, fetch.elements);
        aggregate.properties.push(fetch.property);
    }
    aggregate
}
