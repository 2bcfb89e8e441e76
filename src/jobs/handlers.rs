//! Phase handlers for the daily report workflow
//!
//! Each handler runs one phase against the collaborators in [`JobContext`]
//! and returns that phase's typed output.

use crate::error::{PhaseError, RenderError};
use crate::jobs::context::{JobContext, RunContext};
use crate::jobs::types::{AnalysisOutput, FetchedArtifact, RenderedReport};
use crate::report::format::{fmt_brl, fmt_int};
use tracing::{info, warn};

/// Tickets logged after analysis
const LOGGED_TOP_TICKETS: usize = 3;

/// Phase 1: make the day's dataset available
pub async fn handle_fetch(job: &JobContext, run: &RunContext) -> Result<FetchedArtifact, PhaseError> {
    let artifact = job.fetcher.fetch(run.date(), run.flags().force).await?;
    info!(
        date = %run.date(),
        path = %artifact.path.display(),
        bytes = artifact.bytes,
        reused = artifact.reused,
        attempts = artifact.attempts,
        "Dataset ready: {}",
        artifact.path.display()
    );
    Ok(artifact)
}

/// Phase 2: filter and rank. Receives only the artifact and the filters.
pub async fn handle_analyze(
    job: &JobContext,
    run: &RunContext,
    artifact: &FetchedArtifact,
) -> Result<AnalysisOutput, PhaseError> {
    let output = job
        .analyzer
        .analyze(&artifact.path, &run.settings().filters)
        .await?;
    log_analysis(&output);
    Ok(output)
}

fn log_analysis(output: &AnalysisOutput) {
    let stats = &output.stats;
    info!(
        total_options = stats.total_options,
        after_filters = stats.after_filters,
        selected = output.rows.len(),
        total_volume = stats.total_volume,
        "Analysis: {} options processed, {} after filters, {} selected, session volume {}",
        fmt_int(stats.total_options as i64),
        fmt_int(stats.after_filters as i64),
        output.rows.len(),
        fmt_brl(stats.total_volume, 2)
    );

    if output.rows.is_empty() {
        warn!("No option passed the filters; the report will state that there were no qualifying trades");
        return;
    }

    info!(
        top_n_volume = stats.top_n_volume,
        top_n_pct = stats.top_n_pct,
        "Top {} volume: {} ({:.2}% of the session)",
        output.rows.len(),
        fmt_brl(stats.top_n_volume, 2),
        stats.top_n_pct
    );

    for (idx, row) in output.rows.iter().take(LOGGED_TOP_TICKETS).enumerate() {
        info!(
            rank = idx + 1,
            symbol = %row.symbol,
            avg_ticket = row.avg_ticket,
            "  {}. {:<12} ({:<6} - {:<4}): {:>16}  [{} ops, Vol: {}]",
            idx + 1,
            row.symbol,
            row.underlying,
            row.option_type,
            fmt_brl(row.avg_ticket, 2),
            row.qtdneg,
            fmt_brl(row.voltot, 0)
        );
    }
}

/// Phase 3: write the report and sanity-check its size
pub async fn handle_render(
    job: &JobContext,
    run: &RunContext,
    analysis: &AnalysisOutput,
) -> Result<RenderedReport, PhaseError> {
    let report = job
        .renderer
        .render(&analysis.rows, run.date(), &analysis.stats)
        .await?;

    let min = run.settings().report.min_bytes;
    if report.bytes < min {
        return Err(RenderError::TooSmall {
            path: report.path,
            bytes: report.bytes,
            min,
        }
        .into());
    }
    Ok(report)
}

/// Why delivery should not happen for this run, if it should not
pub fn delivery_skip_reason(run: &RunContext, analysis: &AnalysisOutput) -> Option<String> {
    let email = &run.settings().email;
    if run.flags().no_email {
        return Some("--no-email flag".to_string());
    }
    if !email.enabled {
        return Some("email.enabled = false".to_string());
    }
    if analysis.is_empty() && !email.send_empty_report {
        return Some("no qualifying rows and email.send_empty_report = false".to_string());
    }
    None
}

/// Phase 4: send the report
pub async fn handle_deliver(
    job: &JobContext,
    run: &RunContext,
    report: &RenderedReport,
    analysis: &AnalysisOutput,
) -> Result<(), PhaseError> {
    job.deliverer
        .deliver(&report.path, run.date(), &analysis.rows, &analysis.stats)
        .await?;
    info!(date = %run.date(), "Report email sent");
    Ok(())
}
