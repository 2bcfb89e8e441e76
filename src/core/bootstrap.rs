//! Process-wide setup that must happen before logging starts

use crate::config::PathSettings;
use std::fs;
use std::io;

/// Create every working directory the run writes into
pub fn prepare_directories(paths: &PathSettings) -> io::Result<()> {
    for dir in paths.all() {
        fs::create_dir_all(dir).map_err(|e| {
            io::Error::new(e.kind(), format!("cannot create {}: {}", dir.display(), e))
        })?;
    }
    Ok(())
}
