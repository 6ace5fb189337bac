pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod store;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use fixtures::{MarketplaceSeedDataset, SeedResult, VerificationResult, SEED_OPEN_RFQ_ID};
pub use repositories::RepositoryError;
pub use store::SqlMatchStore;
