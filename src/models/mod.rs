pub mod dataset;
pub mod price;
pub mod rank;

pub use dataset::{AreaPrices, PriceDataset, PriceEntry, NOT_DEFINED};
pub use price::PriceInterval;
pub use rank::{PriceRank, RankedInterval};
