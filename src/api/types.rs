//! Payload models for the token API
//!
//! The provider is loose about types (ids arrive as numbers or strings,
//! numeric cells occasionally as strings, sections as `null`), so every
//! field decodes leniently and defaults when absent.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn null_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Strings and numbers become a trimmed string; empty, null and other shapes become `None`
fn lenient_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

pub(crate) fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn lenient_f64_vec<'de, D>(d: D) -> Result<Vec<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Value>>::deserialize(d)?
        .unwrap_or_default()
        .iter()
        .map(value_as_f64)
        .collect())
}

/// `GET accounts`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountsEnvelope {
    #[serde(default, deserialize_with = "null_default")]
    pub data: AccountsData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountsData {
    #[serde(default, deserialize_with = "null_default")]
    pub accounts: Vec<Account>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    #[serde(default, deserialize_with = "lenient_string")]
    pub number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub properties: Vec<AccountProperty>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountProperty {
    #[serde(default, deserialize_with = "lenient_string")]
    pub consumer_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub connection_number: Option<String>,
}

/// `GET properties/{consumer_id}/usages`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageEnvelope {
    #[serde(default, deserialize_with = "null_default")]
    pub data: UsageRecord,
}

/// Interval usage for one property, one entry per day
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord {
    #[serde(default, deserialize_with = "null_default")]
    pub usages: Vec<UsageDay>,
}

/// One day of half-hourly Wh readings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageDay {
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub iso8601_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64_vec")]
    pub usage: Vec<Option<f64>>,
}

impl UsageDay {
    /// Calendar day, preferring `iso8601_date` over `date`
    pub fn day(&self) -> Option<NaiveDate> {
        [self.iso8601_date.as_deref(), self.date.as_deref()]
            .into_iter()
            .flatten()
            .find_map(|s| NaiveDate::parse_from_str(s.get(..10).unwrap_or(s), "%Y-%m-%d").ok())
    }

    /// Whether either date field names `day`
    pub fn is_on(&self, day: NaiveDate) -> bool {
        let label = day.format("%Y-%m-%d").to_string();
        self.date.as_deref() == Some(label.as_str())
            || self.iso8601_date.as_deref() == Some(label.as_str())
    }
}

/// `GET properties/{consumer_id}/rates`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatesEnvelope {
    #[serde(default, deserialize_with = "null_default")]
    pub data: RatesData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatesData {
    #[serde(default, deserialize_with = "null_default")]
    pub rates: RateTables,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateTables {
    #[serde(default, deserialize_with = "null_default")]
    pub special: Vec<SpecialRate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpecialRate {
    #[serde(default, deserialize_with = "lenient_string")]
    pub meter_number: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub rates: Vec<MonthlyRate>,
}

/// Tax-inclusive prices in cents for one month label ("Jan", "Feb", ...)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonthlyRate {
    #[serde(default, deserialize_with = "lenient_string")]
    pub month: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64_vec")]
    pub incl: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accounts_accept_numeric_ids_and_nulls() {
        let env: AccountsEnvelope = serde_json::from_value(json!({
            "data": {"accounts": [{
                "number": 998877,
                "name": "Home",
                "properties": [
                    {"consumer_id": 1234, "name": "House", "connection_number": "0001111111AB123"},
                    {"consumer_id": null, "name": "Ghost"}
                ]
            }, {"number": "2", "properties": null}]}
        }))
        .unwrap();
        let acct = &env.data.accounts[0];
        assert_eq!(acct.number.as_deref(), Some("998877"));
        assert_eq!(acct.properties[0].consumer_id.as_deref(), Some("1234"));
        assert_eq!(acct.properties[1].consumer_id, None);
        assert!(env.data.accounts[1].properties.is_empty());
    }

    #[test]
    fn usage_day_prefers_iso_date_and_coerces_cells() {
        let day: UsageDay = serde_json::from_value(json!({
            "date": "05/08/2025",
            "iso8601_date": "2025-08-05",
            "usage": [100, "250.5", null, "x"]
        }))
        .unwrap();
        assert_eq!(day.day(), NaiveDate::from_ymd_opt(2025, 8, 5));
        assert_eq!(day.usage, vec![Some(100.0), Some(250.5), None, None]);
    }

    #[test]
    fn missing_data_defaults_to_empty() {
        let env: UsageEnvelope = serde_json::from_value(json!({})).unwrap();
        assert!(env.data.usages.is_empty());
        let env: RatesEnvelope = serde_json::from_value(json!({"data": null})).unwrap();
        assert!(env.data.rates.special.is_empty());
    }
}
