//! External-facing services: market data fetch and email

pub mod fetch;
pub mod mailer;
pub mod market_data;

pub use fetch::{FetchReport, FetchStage};
pub use market_data::MarketDataFetcher;
