use serde::Serialize;

use super::price::PriceInterval;

/// Position of a target hour among the prices of an observation period.
///
/// `rank` is 1-based, cheapest first, and `None` when the target hour is not
/// among the stored intervals of the period. `total` is always the number of
/// intervals in the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceRank {
    pub rank: Option<usize>,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedInterval {
    pub rank: usize,
    #[serde(flatten)]
    pub interval: PriceInterval,
}
