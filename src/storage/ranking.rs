use chrono::{DateTime, Utc};

use crate::models::{PriceInterval, PriceRank, RankedInterval};

/// Order intervals cheapest first. The sort is stable, so equal values keep
/// the order they were passed in (storage order).
fn order_by_value(intervals: &mut [PriceInterval]) {
    intervals.sort_by(|a, b| a.value.total_cmp(&b.value));
}

/// Rank of the interval starting at `key` among `intervals`.
pub fn rank_of(mut intervals: Vec<PriceInterval>, key: &DateTime<Utc>) -> PriceRank {
    let total = intervals.len();
    order_by_value(&mut intervals);

    let rank = intervals
        .iter()
        .position(|interval| interval.start == *key)
        .map(|index| index + 1);

    PriceRank { rank, total }
}

/// Rank every interval, returning them ordered by start.
pub fn rank_all(mut intervals: Vec<PriceInterval>) -> Vec<RankedInterval> {
    order_by_value(&mut intervals);

    let mut ranked: Vec<RankedInterval> = intervals
        .into_iter()
        .enumerate()
        .map(|(index, interval)| RankedInterval {
            rank: index + 1,
            interval,
        })
        .collect();
    ranked.sort_by_key(|r| r.interval.start);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn hourly(values: &[f64]) -> Vec<PriceInterval> {
        let day = Utc.with_ymd_and_hms(2022, 11, 2, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(hour, value)| {
                let start = day + Duration::hours(hour as i64);
                PriceInterval {
                    area: "FI".to_string(),
                    start,
                    end: start + Duration::hours(1),
                    value: *value,
                    updated_at: day,
                }
            })
            .collect()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 11, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_cheapest_is_rank_one() {
        let rank = rank_of(hourly(&[30.0, 10.0, 20.0]), &at(1));
        assert_eq!(rank, PriceRank { rank: Some(1), total: 3 });
    }

    #[test]
    fn test_most_expensive_is_last() {
        let rank = rank_of(hourly(&[30.0, 10.0, 20.0]), &at(0));
        assert_eq!(rank, PriceRank { rank: Some(3), total: 3 });
    }

    #[test]
    fn test_negative_prices_rank_first() {
        let rank = rank_of(hourly(&[5.0, -1.5, 0.0]), &at(1));
        assert_eq!(rank.rank, Some(1));
    }

    #[test]
    fn test_ties_keep_storage_order() {
        let intervals = hourly(&[10.0, 10.0, 5.0]);

        assert_eq!(rank_of(intervals.clone(), &at(0)).rank, Some(2));
        assert_eq!(rank_of(intervals, &at(1)).rank, Some(3));
    }

    #[test]
    fn test_missing_key_still_counts() {
        let rank = rank_of(hourly(&[1.0, 2.0]), &at(5));
        assert_eq!(rank, PriceRank { rank: None, total: 2 });
    }

    #[test]
    fn test_empty_period() {
        let rank = rank_of(Vec::new(), &at(0));
        assert_eq!(rank, PriceRank { rank: None, total: 0 });
    }

    #[test]
    fn test_rank_all_ordered_by_start() {
        let ranked = rank_all(hourly(&[30.0, 10.0, 20.0]));

        let starts: Vec<_> = ranked.iter().map(|r| r.interval.start).collect();
        assert_eq!(starts, vec![at(0), at(1), at(2)]);

        let ranks: Vec<_> = ranked.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![3, 1, 2]);
    }

    #[test]
    fn test_rank_all_agrees_with_rank_of() {
        let intervals = hourly(&[4.0, 4.0, 1.0, 9.0, 2.5]);
        let ranked = rank_all(intervals.clone());

        for entry in ranked {
            let single = rank_of(intervals.clone(), &entry.interval.start);
            assert_eq!(single.rank, Some(entry.rank));
        }
    }
}
