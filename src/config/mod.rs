//! Configuration: `.env`-driven environment lookups plus the TOML settings file

pub mod env;
pub mod settings;

pub use env::{expand_env_vars, get_config_path, get_environment, is_production};
pub use settings::{
    CalendarSettings, EmailSettings, FetchSettings, FilterSettings, LockSettings, PathSettings,
    ReportSettings, Settings,
};
