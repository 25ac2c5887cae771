use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use comfy_table::{modifiers, presets, Cell, CellAlignment, Color, Table};
use tracing::info;

use nordpool_price_cache::{PriceDataset, PriceRepository, RankedInterval};

#[derive(Parser)]
#[command(author, version, about = "Local cache of electricity spot prices", propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store price datasets read from JSON files.
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the price at an instant.
    Price {
        area: String,

        /// RFC 3339 instant, defaults to now.
        #[arg(long)]
        at: Option<DateTime<FixedOffset>>,
    },

    /// Print the rank of an hour among the prices of a period, cheapest first.
    Rank {
        area: String,

        #[arg(long)]
        from: DateTime<FixedOffset>,

        #[arg(long)]
        to: DateTime<FixedOffset>,

        /// RFC 3339 instant, defaults to now.
        #[arg(long)]
        at: Option<DateTime<FixedOffset>>,
    },

    /// Print every hour of a local calendar day with its price and rank.
    Table {
        area: String,

        /// Day in the display time zone, defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Print how long ago the prices of an area were last updated.
    Age {
        area: String,

        /// Exit with status 2 if the prices are older than this or missing.
        #[arg(long)]
        max_age_seconds: Option<u64>,
    },

    /// List stored areas.
    Areas,
}

impl Command {
    pub async fn run(self, repository: &PriceRepository, timezone: Tz) -> Result<ExitCode> {
        match self {
            Self::Import { files } => {
                for path in files {
                    let file = File::open(&path)
                        .with_context(|| format!("failed to open {}", path.display()))?;
                    let dataset: PriceDataset = serde_json::from_reader(BufReader::new(file))
                        .with_context(|| format!("failed to parse {}", path.display()))?;
                    info!(path = %path.display(), entries = dataset.entry_count(), "Importing dataset");

                    let summary = repository.upsert_dataset(&dataset).await?;
                    println!(
                        "{}: {} written, {} skipped",
                        path.display(),
                        summary.written,
                        summary.skipped
                    );
                }
            }

            Self::Price { area, at } => {
                let at = at.map_or_else(Utc::now, |at| at.with_timezone(&Utc));
                match repository.price_at(&area, &at).await? {
                    Some(value) => println!("{}", value),
                    None => println!("-"),
                }
            }

            Self::Rank { area, from, to, at } => {
                let at = at.map_or_else(Utc::now, |at| at.with_timezone(&Utc));
                let rank = repository.rank_at(&area, &from, &to, &at).await?;
                match rank.rank {
                    Some(position) => println!("{}/{}", position, rank.total),
                    None => println!("-/{}", rank.total),
                }
            }

            Self::Table { area, date } => {
                let date = date.unwrap_or_else(|| Utc::now().with_timezone(&timezone).date_naive());
                let start = local_midnight(timezone, date)?;
                let end = local_midnight(timezone, date + Duration::days(1))?;

                let ranked = repository.rank_table(&area, &start, &end).await?;
                if ranked.is_empty() {
                    println!("No prices stored for {} on {}", area, date);
                } else {
                    println!("{}", build_rank_table(&ranked, timezone));
                }
            }

            Self::Age { area, max_age_seconds } => {
                let age = repository.age_since_last_update(&area).await?;
                match age {
                    Some(age) => println!("{:.0}", age),
                    None => println!("unknown"),
                }

                if let Some(max_age) = max_age_seconds {
                    if repository.needs_refresh(&area, StdDuration::from_secs(max_age)).await? {
                        return Ok(ExitCode::from(2));
                    }
                }
            }

            Self::Areas => {
                for area in repository.areas().await? {
                    println!("{}", area);
                }
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}

fn local_midnight(timezone: Tz, date: NaiveDate) -> Result<DateTime<Tz>> {
    let midnight = date.and_hms_opt(0, 0, 0).context("invalid midnight")?;
    timezone
        .from_local_datetime(&midnight)
        .earliest()
        .with_context(|| format!("{} has no midnight in {}", date, timezone))
}

fn build_rank_table(ranked: &[RankedInterval], timezone: Tz) -> Table {
    let half = ranked.len().div_ceil(2);

    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.set_header(vec!["Start", "End", "Price", "Rank"]);
    for entry in ranked {
        let color = if entry.rank <= half { Color::Green } else { Color::Red };
        table.add_row(vec![
            Cell::new(entry.interval.start.with_timezone(&timezone).format("%H:%M")),
            Cell::new(entry.interval.end.with_timezone(&timezone).format("%H:%M")),
            Cell::new(entry.interval.value).set_alignment(CellAlignment::Right).fg(color),
            Cell::new(entry.rank).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_local_midnight_helsinki() {
        let date = NaiveDate::from_ymd_opt(2022, 11, 2).unwrap();
        let midnight = local_midnight(chrono_tz::Europe::Helsinki, date).unwrap();

        let utc = midnight.with_timezone(&Utc);
        assert_eq!(utc.hour(), 22);
        assert_eq!(utc.date_naive(), NaiveDate::from_ymd_opt(2022, 11, 1).unwrap());
    }

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from([
            "nordpool-price-cache",
            "rank",
            "FI",
            "--from",
            "2022-11-02T00:00:00+02:00",
            "--to",
            "2022-11-03T00:00:00+02:00",
        ])
        .unwrap();

        match args.command {
            Command::Rank { area, from, at, .. } => {
                assert_eq!(area, "FI");
                assert_eq!(from.offset().local_minus_utc(), 7200);
                assert!(at.is_none());
            }
            _ => panic!("expected the rank command"),
        }
    }
}
