//! Market data source interface used by the fetch phase.

use crate::error::PhaseError;
use crate::jobs::types::FetchedArtifact;
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait MarketDataFetcher: Send + Sync {
    /// Make the dataset for `date` available on disk and return where it is.
    /// With `force` an existing artifact is never reused.
    async fn fetch(&self, date: NaiveDate, force: bool) -> Result<FetchedArtifact, PhaseError>;
}
