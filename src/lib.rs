//! Daily B3 options report: fetch, analyze, render and deliver, once per
//! business day.

pub mod analysis;
pub mod calendar;
pub mod config;
pub mod core;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod models;
pub mod report;
pub mod services;
