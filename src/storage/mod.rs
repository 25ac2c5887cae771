pub mod error;
pub mod ranking;
pub mod repository;
pub mod time;

pub use error::StorageError;
pub use repository::{PriceRepository, UpsertSummary};
