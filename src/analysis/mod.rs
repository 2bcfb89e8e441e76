//! Options dataset analysis: schema check, cleaning, filters and ranking

pub mod analyzer;
pub mod schema;

use crate::config::FilterSettings;
use crate::error::PhaseError;
use crate::jobs::types::AnalysisOutput;
use async_trait::async_trait;
use std::path::Path;

pub use analyzer::{rank_quotes, OptionsAnalyzer};
pub use schema::{validate_headers, REQUIRED_COLUMNS};

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        path: &Path,
        filters: &FilterSettings,
    ) -> Result<AnalysisOutput, PhaseError>;
}
