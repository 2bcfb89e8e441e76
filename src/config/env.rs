//! Environment lookups and `${VAR}` expansion for configuration values

use std::env;
use std::path::PathBuf;
use tracing::warn;

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/settings.toml";

/// Deployment environment from `APP_ENV` (defaults to `sandbox`)
pub fn get_environment() -> String {
    env::var("APP_ENV").unwrap_or_else(|_| "sandbox".to_string())
}

pub fn is_production() -> bool {
    matches!(get_environment().as_str(), "production" | "prod")
}

/// Configuration file path from `OPTRIX_CONFIG`, else [`DEFAULT_CONFIG_PATH`]
pub fn get_config_path() -> PathBuf {
    env::var("OPTRIX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// SMTP app password from `GMAIL_APP_PASSWORD`, if set and non-empty
pub fn get_smtp_password() -> Option<String> {
    env::var("GMAIL_APP_PASSWORD")
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Expand `${VAR}` and `$VAR` from the process environment.
/// Unknown variables are left as written.
pub fn expand_env_vars(input: &str) -> String {
    expand_with(input, |name| env::var(name).ok())
}

/// Expansion with an explicit variable source
pub fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) if end > 0 => (&braced[..end], end + 2),
                _ => ("", 0),
            }
        } else {
            let len = identifier_len(after);
            (&after[..len], len)
        };

        if consumed == 0 {
            out.push('$');
            rest = after;
            continue;
        }

        let original = &rest[pos..pos + 1 + consumed];
        match lookup(name) {
            Some(value) => out.push_str(&value),
            None => {
                warn!(variable = %name, "Environment variable not found: {}", name);
                out.push_str(original);
            }
        }
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}

/// Recursively expand every string inside a TOML tree
pub fn expand_value(value: toml::Value) -> toml::Value {
    match value {
        toml::Value::String(s) => toml::Value::String(expand_env_vars(&s)),
        toml::Value::Array(items) => {
            toml::Value::Array(items.into_iter().map(expand_value).collect())
        }
        toml::Value::Table(table) => toml::Value::Table(
            table
                .into_iter()
                .map(|(key, v)| (key, expand_value(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Length of a leading `[A-Za-z_][A-Za-z0-9_]*`
fn identifier_len(s: &str) -> usize {
    let mut len = 0;
    for (i, c) in s.char_indices() {
        let ok = if i == 0 {
            c.is_ascii_alphabetic() || c == '_'
        } else {
            c.is_ascii_alphanumeric() || c == '_'
        };
        if !ok {
            break;
        }
        len = i + c.len_utf8();
    }
    len
}
