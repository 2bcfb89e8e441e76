use crate::error::AnalysisError;
use csv::StringRecord;
use tracing::{debug, info};

/// Columns without which no ranking is possible
pub const REQUIRED_COLUMNS: [&str; 5] = ["symbol", "underlying", "option_type", "qtdneg", "voltot"];

/// Check the header row. Optional columns may be missing; required ones may not.
pub fn validate_headers(headers: &StringRecord) -> Result<(), AnalysisError> {
    let available: Vec<&str> = headers.iter().map(str::trim).collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|col| !available.contains(col))
        .collect();

    if !missing.is_empty() {
        return Err(AnalysisError::SchemaInvalid(format!(
            "missing required columns {:?}; available columns: {:?}",
            missing, available
        )));
    }

    info!(columns = available.len(), "Schema validated: {} columns present", available.len());
    debug!("Columns: {}", available.join(", "));
    Ok(())
}
