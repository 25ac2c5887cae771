use chrono::{DateTime, TimeZone, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::time::{Duration as StdDuration, Instant};
use tracing::{debug, error, info};

use crate::config::DatabaseConfig;
use crate::metrics;
use crate::models::{PriceDataset, PriceEntry, PriceInterval, PriceRank, RankedInterval};
use crate::models::price::PriceRow;

use super::error::StorageError;
use super::ranking::{rank_all, rank_of};
use super::time::{
    ceil_to_second, check_whole_second, format_timestamp, parse_timestamp, to_canonical_checked,
    truncate_to_hour,
};

static MIGRATOR: Migrator = sqlx::migrate!();

const UPSERT_PRICE: &str = r#"
    INSERT INTO prices (area, start, "end", value, updated_at)
    VALUES (?, ?, ?, ?, ?)
    ON CONFLICT (area, start)
    DO UPDATE SET
        "end" = excluded."end",
        value = excluded.value,
        updated_at = excluded.updated_at
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertSummary {
    pub written: usize,
    pub skipped: usize,
}

impl UpsertSummary {
    pub fn merge(&mut self, other: UpsertSummary) {
        self.written += other.written;
        self.skipped += other.skipped;
    }
}

/// Persistent store of price intervals per area, backed by SQLite.
///
/// All instants are normalized to UTC on the way in; see [`super::time`].
pub struct PriceRepository {
    pool: SqlitePool,
}

impl PriceRepository {
    /// Open (and if configured, create) the database and bring the schema up to date.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(config.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(StdDuration::from_secs(config.busy_timeout_seconds));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await?;

        MIGRATOR.run(&pool).await?;
        info!(path = %config.path.display(), "Price database opened");

        Ok(Self { pool })
    }

    /// Close every pooled connection. Further use of the pool fails with `PoolClosed`.
    pub async fn close(self) {
        self.pool.close().await;
        info!("Price database closed");
    }

    pub async fn health_check(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────────

    /// Insert or replace the prices of one area.
    ///
    /// Entries carrying the "not defined" marker are skipped without further
    /// checks. Every other entry is validated before anything is written, then
    /// written in its own transaction, so a failure part way leaves the earlier
    /// entries committed.
    #[tracing::instrument(skip(self, entries), fields(area = %area, count = entries.len()))]
    pub async fn upsert(&self, area: &str, entries: &[PriceEntry]) -> Result<UpsertSummary, StorageError> {
        validate_area(area)?;
        let skipped = entries.len() - entries.iter().filter(|e| e.is_defined()).count();
        let rows = entries
            .iter()
            .filter(|entry| entry.is_defined())
            .map(|entry| {
                let (start, end) = validate_entry(entry)?;
                Ok((format_timestamp(&start), format_timestamp(&end), entry.value))
            })
            .collect::<Result<Vec<_>, StorageError>>()?;

        let start_time = Instant::now();
        let mut summary = UpsertSummary {
            written: 0,
            skipped,
        };

        for (start, end, value) in rows {
            let now = format_timestamp(&Utc::now());

            let mut tx = self.pool.begin().await?;
            sqlx::query(UPSERT_PRICE)
                .bind(area)
                .bind(&start)
                .bind(&end)
                .bind(value)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            summary.written += 1;
        }

        metrics::record_db_query_duration("upsert", start_time.elapsed());
        metrics::record_prices_upserted(area, summary.written as u64);
        if summary.skipped > 0 {
            metrics::record_prices_skipped(area, summary.skipped as u64);
            debug!(skipped = summary.skipped, "Skipped prices without a defined value");
        }

        info!(
            written = summary.written,
            skipped = summary.skipped,
            duration_ms = start_time.elapsed().as_millis(),
            "Upserted prices"
        );

        Ok(summary)
    }

    /// Upsert every area of a dataset, one area after another.
    #[tracing::instrument(skip(self, dataset), fields(areas = dataset.areas.len()))]
    pub async fn upsert_dataset(&self, dataset: &PriceDataset) -> Result<UpsertSummary, StorageError> {
        let mut summary = UpsertSummary::default();

        for (area, prices) in &dataset.areas {
            summary.merge(self.upsert(area, &prices.values).await?);
        }

        info!(
            currency = dataset.currency.as_deref().unwrap_or("unknown"),
            written = summary.written,
            skipped = summary.skipped,
            "Upserted dataset"
        );

        Ok(summary)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────────

    /// Price of the interval containing `instant`, or `None` if nothing is stored for it.
    #[tracing::instrument(skip(self, instant), fields(area = %area))]
    pub async fn price_at<Tz: TimeZone>(
        &self,
        area: &str,
        instant: &DateTime<Tz>,
    ) -> Result<Option<f64>, StorageError> {
        validate_area(area)?;
        let instant = to_canonical_checked(instant)?;
        let at = format_timestamp(&instant);

        let start_time = Instant::now();
        let rows = sqlx::query_as::<_, PriceRow>(
            r#"
            SELECT area, start, "end", value, updated_at
            FROM prices
            WHERE area = ? AND start <= ? AND "end" > ?
            "#,
        )
        .bind(area)
        .bind(&at)
        .bind(&at)
        .fetch_all(&self.pool)
        .await?;
        metrics::record_db_query_duration("price_at", start_time.elapsed());

        match rows.as_slice() {
            [] => {
                debug!(instant = %at, "No price stored");
                Ok(None)
            }
            [row] => Ok(Some(row.value)),
            _ => {
                metrics::record_integrity_violation(area);
                error!(instant = %at, count = rows.len(), "Overlapping price intervals");
                Err(StorageError::IntegrityViolation {
                    area: area.to_string(),
                    instant,
                    count: rows.len(),
                })
            }
        }
    }

    /// Rank of the hour containing `instant` among the prices of
    /// `[period_start, period_end)`, cheapest first.
    ///
    /// Only intervals lying entirely inside the period take part.
    #[tracing::instrument(skip(self, period_start, period_end, instant), fields(area = %area))]
    pub async fn rank_at<Tz1: TimeZone, Tz2: TimeZone, Tz3: TimeZone>(
        &self,
        area: &str,
        period_start: &DateTime<Tz1>,
        period_end: &DateTime<Tz2>,
        instant: &DateTime<Tz3>,
    ) -> Result<PriceRank, StorageError> {
        validate_area(area)?;
        let key = truncate_to_hour(&to_canonical_checked(instant)?)?;

        let intervals = self
            .select_period(
                area,
                &to_canonical_checked(period_start)?,
                &to_canonical_checked(period_end)?,
                "rank_at",
            )
            .await?;
        let rank = rank_of(intervals, &key);

        debug!(key = %key, rank = ?rank.rank, total = rank.total, "Ranked price");
        Ok(rank)
    }

    /// Every interval of the period together with its rank, ordered by start.
    #[tracing::instrument(skip(self, period_start, period_end), fields(area = %area))]
    pub async fn rank_table<Tz1: TimeZone, Tz2: TimeZone>(
        &self,
        area: &str,
        period_start: &DateTime<Tz1>,
        period_end: &DateTime<Tz2>,
    ) -> Result<Vec<RankedInterval>, StorageError> {
        validate_area(area)?;
        let intervals = self
            .select_period(
                area,
                &to_canonical_checked(period_start)?,
                &to_canonical_checked(period_end)?,
                "rank_table",
            )
            .await?;
        Ok(rank_all(intervals))
    }

    /// Intervals lying entirely inside `[start, end)`, ordered by start.
    #[tracing::instrument(skip(self, start, end), fields(area = %area))]
    pub async fn prices_between<Tz1: TimeZone, Tz2: TimeZone>(
        &self,
        area: &str,
        start: &DateTime<Tz1>,
        end: &DateTime<Tz2>,
    ) -> Result<Vec<PriceInterval>, StorageError> {
        validate_area(area)?;
        let mut intervals = self
            .select_period(
                area,
                &to_canonical_checked(start)?,
                &to_canonical_checked(end)?,
                "prices_between",
            )
            .await?;
        intervals.sort_by_key(|interval| interval.start);
        Ok(intervals)
    }

    /// Seconds since the prices of `area` were last written, `None` if they never were.
    #[tracing::instrument(skip(self), fields(area = %area))]
    pub async fn age_since_last_update(&self, area: &str) -> Result<Option<f64>, StorageError> {
        validate_area(area)?;

        let start_time = Instant::now();
        let last_update: Option<String> =
            sqlx::query_scalar("SELECT MAX(updated_at) FROM prices WHERE area = ?")
                .bind(area)
                .fetch_one(&self.pool)
                .await?;
        metrics::record_db_query_duration("age_since_last_update", start_time.elapsed());

        let Some(last_update) = last_update else {
            return Ok(None);
        };
        let last_update = parse_timestamp(&last_update)?;

        let age = (Utc::now() - last_update).num_milliseconds() as f64 / 1000.0;
        Ok(Some(age.max(0.0)))
    }

    /// Whether the area was never updated or was last updated more than `max_age` ago.
    pub async fn needs_refresh(&self, area: &str, max_age: StdDuration) -> Result<bool, StorageError> {
        let age = self.age_since_last_update(area).await?;
        Ok(age.map_or(true, |age| age > max_age.as_secs_f64()))
    }

    pub async fn areas(&self) -> Result<Vec<String>, StorageError> {
        let areas: Vec<String> = sqlx::query_scalar("SELECT DISTINCT area FROM prices ORDER BY area")
            .fetch_all(&self.pool)
            .await?;
        Ok(areas)
    }

    /// Rows of `area` with `start >= period_start AND end <= period_end`, in storage order.
    ///
    /// Stored timestamps are whole seconds, so the start bound is rounded up and
    /// the end bound down (by formatting) without changing the result.
    async fn select_period(
        &self,
        area: &str,
        period_start: &DateTime<Utc>,
        period_end: &DateTime<Utc>,
        operation: &str,
    ) -> Result<Vec<PriceInterval>, StorageError> {
        let period_start = ceil_to_second(period_start)?;
        let start_time = Instant::now();
        let rows = sqlx::query_as::<_, PriceRow>(
            r#"
            SELECT area, start, "end", value, updated_at
            FROM prices
            WHERE area = ? AND start >= ? AND "end" <= ?
            ORDER BY rowid ASC
            "#,
        )
        .bind(area)
        .bind(format_timestamp(&period_start))
        .bind(format_timestamp(period_end))
        .fetch_all(&self.pool)
        .await?;
        metrics::record_db_query_duration(operation, start_time.elapsed());

        rows.into_iter().map(PriceInterval::try_from).collect()
    }
}

fn validate_area(area: &str) -> Result<(), StorageError> {
    if area.trim().is_empty() {
        return Err(StorageError::InvalidInput("Area code must not be empty".to_string()));
    }
    Ok(())
}

/// Check a defined entry and return its canonical bounds.
fn validate_entry(entry: &PriceEntry) -> Result<(DateTime<Utc>, DateTime<Utc>), StorageError> {
    if entry.value.is_nan() {
        return Err(StorageError::InvalidInput(format!(
            "Price for {} is not a number",
            entry.start
        )));
    }
    if entry.end <= entry.start {
        return Err(StorageError::InvalidInput(format!(
            "Interval end {} is not after start {}",
            entry.end, entry.start
        )));
    }

    let start = to_canonical_checked(&entry.start)?;
    let end = to_canonical_checked(&entry.end)?;
    check_whole_second(&start)?;
    check_whole_second(&end)?;
    Ok((start, end))
}
