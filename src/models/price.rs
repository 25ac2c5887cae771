use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

use crate::storage::time::parse_timestamp;
use crate::storage::StorageError;

/// A stored price for the half-open interval `[start, end)` of one area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceInterval {
    pub area: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub value: f64,
    pub updated_at: DateTime<Utc>,
}

/// Raw row of the `prices` table, timestamps still in their stored text form.
#[derive(Debug, FromRow)]
pub(crate) struct PriceRow {
    pub area: String,
    pub start: String,
    pub end: String,
    pub value: f64,
    pub updated_at: String,
}

impl TryFrom<PriceRow> for PriceInterval {
    type Error = StorageError;

    fn try_from(row: PriceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            start: parse_timestamp(&row.start)?,
            end: parse_timestamp(&row.end)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            area: row.area,
            value: row.value,
        })
    }
}
