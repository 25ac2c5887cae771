pub mod config;
pub mod metrics;
pub mod models;
pub mod storage;

pub use config::AppConfig;
pub use metrics::init_metrics;
pub use models::{PriceDataset, PriceEntry, PriceInterval, PriceRank, RankedInterval, NOT_DEFINED};
pub use storage::{PriceRepository, StorageError, UpsertSummary};
