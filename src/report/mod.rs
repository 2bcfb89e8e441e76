//! Report rendering

pub mod format;
pub mod html;

use crate::error::PhaseError;
use crate::jobs::types::RenderedReport;
use crate::models::{AnalysisStats, RankedOption};
use async_trait::async_trait;
use chrono::NaiveDate;

pub use html::HtmlReportRenderer;

#[async_trait]
pub trait ReportRenderer: Send + Sync {
    /// Write the report for `date` and return where it landed
    async fn render(
        &self,
        rows: &[RankedOption],
        date: NaiveDate,
        stats: &AnalysisStats,
    ) -> Result<RenderedReport, PhaseError>;
}
