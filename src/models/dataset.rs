use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{de, Deserialize, Deserializer};

/// Marker for a price the market data source did not define.
pub const NOT_DEFINED: f64 = f64::INFINITY;

/// A price dataset as produced by the market data fetcher: prices per area.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PriceDataset {
    #[serde(default)]
    pub currency: Option<String>,
    pub areas: BTreeMap<String, AreaPrices>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AreaPrices {
    pub values: Vec<PriceEntry>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceEntry {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    #[serde(deserialize_with = "deserialize_value")]
    pub value: f64,
}

impl PriceDataset {
    pub fn new(currency: Option<String>) -> Self {
        Self {
            currency,
            areas: BTreeMap::new(),
        }
    }

    pub fn with_area(mut self, area: impl Into<String>, values: Vec<PriceEntry>) -> Self {
        self.areas.insert(area.into(), AreaPrices { values });
        self
    }

    pub fn entry_count(&self) -> usize {
        self.areas.values().map(|a| a.values.len()).sum()
    }
}

impl PriceEntry {
    pub fn new<Tz: TimeZone>(start: DateTime<Tz>, end: DateTime<Tz>, value: f64) -> Self {
        Self {
            start: start.fixed_offset(),
            end: end.fixed_offset(),
            value,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.value != NOT_DEFINED
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Text(String),
}

/// Accepts a number, `null` (not defined) or a numeric string such as `"inf"`.
fn deserialize_value<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawValue>::deserialize(deserializer)? {
        None => Ok(NOT_DEFINED),
        Some(RawValue::Number(value)) => Ok(value),
        Some(RawValue::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map_err(|e| de::Error::custom(format!("Invalid price value {:?}: {}", text, e))),
    }
}
