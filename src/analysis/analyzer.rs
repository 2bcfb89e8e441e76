use crate::analysis::schema::validate_headers;
use crate::analysis::Analyzer;
use crate::config::FilterSettings;
use crate::error::{AnalysisError, PhaseError};
use crate::jobs::types::AnalysisOutput;
use crate::models::{AnalysisStats, OptionQuote, RankedOption};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Number of underlyings reported in the statistics
const TOP_UNDERLYINGS: usize = 3;

/// CSV-backed analyzer for the daily options dataset
#[derive(Debug, Default, Clone)]
pub struct OptionsAnalyzer;

impl OptionsAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Load the dataset at `path` and rank it
    pub fn analyze_file(
        &self,
        path: &Path,
        filters: &FilterSettings,
    ) -> Result<AnalysisOutput, AnalysisError> {
        info!(path = %path.display(), "Loading dataset {}", path.display());

        if !path.exists() {
            return Err(AnalysisError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let read_err = |source| AnalysisError::Read {
            path: path.to_path_buf(),
            source,
        };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(read_err)?;

        let headers = reader.headers().map_err(read_err)?.clone();
        validate_headers(&headers)?;

        let quotes = reader
            .deserialize::<OptionQuote>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(read_err)?;

        info!(
            rows = quotes.len(),
            columns = headers.len(),
            "Dataset loaded: {} rows, {} columns",
            quotes.len(),
            headers.len()
        );

        Ok(rank_quotes(quotes, filters))
    }
}

#[async_trait]
impl Analyzer for OptionsAnalyzer {
    async fn analyze(
        &self,
        path: &Path,
        filters: &FilterSettings,
    ) -> Result<AnalysisOutput, PhaseError> {
        let analyzer = self.clone();
        let path: PathBuf = path.to_path_buf();
        let filters = filters.clone();

        tokio::task::spawn_blocking(move || analyzer.analyze_file(&path, &filters))
            .await
            .map_err(|e| PhaseError::Unexpected(format!("analysis task failed: {}", e)))?
            .map_err(PhaseError::from)
    }
}

/// Clean, filter and rank already-parsed rows.
///
/// Rows with no trades or a non-finite average ticket are dropped. The sort
/// is stable, so ties keep dataset order.
pub fn rank_quotes(quotes: Vec<OptionQuote>, filters: &FilterSettings) -> AnalysisOutput {
    let total_options = quotes.len();
    let total_volume: f64 = quotes
        .iter()
        .map(|q| q.voltot)
        .filter(|v| v.is_finite())
        .sum();

    let mut stats = AnalysisStats {
        total_options,
        total_volume,
        ..AnalysisStats::default()
    };

    info!(
        total_volume,
        "Session volume: R$ {:.2}",
        total_volume
    );

    let missing_premed = quotes.iter().filter(|q| q.premed.is_none()).count();
    if missing_premed > 0 && total_options > 0 {
        warn!(
            missing = missing_premed,
            "premed missing for {} rows ({:.1}%), falling back to preult",
            missing_premed,
            missing_premed as f64 / total_options as f64 * 100.0
        );
    }

    let before_clean = quotes.len();
    let traded: Vec<OptionQuote> = quotes.into_iter().filter(|q| q.qtdneg > 0).collect();
    let removed = before_clean - traded.len();
    if removed > 0 {
        warn!(
            removed,
            "Removed {} rows with qtdneg <= 0 ({:.1}%)",
            removed,
            removed as f64 / before_clean as f64 * 100.0
        );
    }

    let mut candidates: Vec<RankedOption> = Vec::with_capacity(traded.len());
    let mut non_finite = 0;
    for quote in traded {
        let avg_ticket = quote.voltot / quote.qtdneg as f64;
        if !avg_ticket.is_finite() {
            non_finite += 1;
            continue;
        }
        candidates.push(ranked(quote, avg_ticket, total_volume));
    }
    if non_finite > 0 {
        warn!(count = non_finite, "Dropped {} rows with a non-finite average ticket", non_finite);
    }

    if candidates.is_empty() {
        error!("No rows left after cleaning");
        return AnalysisOutput {
            rows: Vec::new(),
            stats,
        };
    }

    info!(
        max_operations = filters.max_operations,
        min_financial_volume = filters.min_financial_volume,
        "Applying filters: at most {} trades, at least R$ {:.2}",
        filters.max_operations,
        filters.min_financial_volume
    );

    let cleaned = candidates.len();
    let mut filtered: Vec<RankedOption> = candidates
        .into_iter()
        .filter(|r| r.qtdneg <= filters.max_operations && r.voltot >= filters.min_financial_volume)
        .collect();

    info!(
        after_filters = filtered.len(),
        "Filters kept {} rows ({:.1}% of {})",
        filtered.len(),
        filtered.len() as f64 / cleaned as f64 * 100.0,
        cleaned
    );

    if filtered.is_empty() {
        warn!(
            "No rows passed the filters; consider lowering min_financial_volume (R$ {:.2}) or raising max_operations ({})",
            filters.min_financial_volume,
            filters.max_operations
        );
        return AnalysisOutput {
            rows: Vec::new(),
            stats,
        };
    }

    stats.after_filters = filtered.len();

    filtered.sort_by(|a, b| b.avg_ticket.total_cmp(&a.avg_ticket));
    filtered.truncate(filters.top_n);
    let top = filtered;

    stats.top_n_volume = top.iter().map(|r| r.voltot).sum();
    stats.top_n_pct = percent(stats.top_n_volume, stats.total_volume);
    stats.call_count = top.iter().filter(|r| r.is_call()).count();
    stats.put_count = top.iter().filter(|r| r.is_put()).count();
    stats.top_underlyings = top_underlyings(&top, TOP_UNDERLYINGS);

    info!(
        selected = top.len(),
        top_n_volume = stats.top_n_volume,
        top_n_pct = stats.top_n_pct,
        calls = stats.call_count,
        puts = stats.put_count,
        "Selected top {} of {} candidates: R$ {:.2} ({:.2}% of the session)",
        top.len(),
        stats.after_filters,
        stats.top_n_volume,
        stats.top_n_pct
    );

    AnalysisOutput { rows: top, stats }
}

fn ranked(quote: OptionQuote, avg_ticket: f64, total_volume: f64) -> RankedOption {
    RankedOption {
        day_share_pct: percent(quote.voltot, total_volume),
        premed: quote.premed.or(quote.preult),
        symbol: quote.symbol,
        underlying: quote.underlying,
        option_type: quote.option_type,
        maturity_date: quote.maturity_date,
        strike_price: quote.strike_price,
        preult: quote.preult,
        voltot: quote.voltot,
        qtdneg: quote.qtdneg,
        quatot: quote.quatot,
        avg_ticket,
    }
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 {
        part / whole * 100.0
    } else {
        0.0
    }
}

/// Most frequent underlyings, ties broken by first appearance
fn top_underlyings(rows: &[RankedOption], limit: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (idx, row) in rows.iter().enumerate() {
        let entry = counts.entry(row.underlying.as_str()).or_insert((0, idx));
        entry.0 += 1;
    }

    let mut ordered: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(name, (count, first))| (name, count, first))
        .collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ordered
        .into_iter()
        .take(limit)
        .map(|(name, count, _)| (name.to_string(), count))
        .collect()
}
