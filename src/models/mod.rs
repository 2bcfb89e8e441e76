//! Shared data models spanning the pipeline phases.

pub mod options;

pub use options::{AnalysisStats, OptionQuote, RankedOption};
