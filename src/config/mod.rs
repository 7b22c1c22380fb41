//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;

/// Default Commerce7 REST endpoint
pub const DEFAULT_C7_API_URL: &str = "https://api.commerce7.com/v1";

/// Default database location, relative to the working directory
pub const DEFAULT_DB_PATH: &str = "data/commerce7.db";

/// Process run mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunMode {
    Development,
    Production,
}

impl RunMode {
    /// Default log filter for this mode when neither RUST_LOG nor LOG_LEVEL is set
    pub fn default_log_level(&self) -> &'static str {
        match self {
            RunMode::Development => "debug",
            RunMode::Production => "info",
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of plain text
    pub log_json: bool,
    pub run_mode: RunMode,
    /// Entry module name from the legacy launcher, kept for logging only
    pub app_name: Option<String>,

    /// Path to the SQLite database file
    pub db_path: String,

    /// Commerce7 API base URL
    pub c7_api_url: String,
    /// Commerce7 tenant identifier
    pub c7_tenant: Option<String>,
    /// Commerce7 basic auth token
    pub c7_auth_token: Option<String>,
    /// Client-side request budget against the Commerce7 API
    pub c7_requests_per_second: u32,
    /// Orders from these external vendors are never ingested
    pub excluded_vendors: Vec<String>,
    /// Club signups credited to these associates are never ingested
    pub excluded_associates: Vec<String>,

    /// Replace all data with generated demo data at startup
    pub demo_mode: bool,
    /// Fixed seed for demo data generation
    pub demo_seed: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR so container platforms can inject it
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string())
        };

        let run_mode = run_mode_from(
            env::var("FLASK_ENV").ok().as_deref(),
            env::var("FLASK_DEBUG").ok().as_deref(),
        );

        let c7_requests_per_second = match env::var("C7_REQUESTS_PER_SECOND") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("C7_REQUESTS_PER_SECOND", raw))?,
            Err(_) => 2,
        };

        let demo_seed = match env::var("DEMO_SEED") {
            Ok(raw) => Some(
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::Invalid("DEMO_SEED", raw))?,
            ),
            Err(_) => None,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL")
                .unwrap_or_else(|_| run_mode.default_log_level().to_string()),
            log_json: env::var("LOG_FORMAT")
                .map(|v| v.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            run_mode,
            app_name: non_empty(env::var("FLASK_APP").ok()),

            db_path: env::var("DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string()),

            c7_api_url: env::var("C7_API_URL")
                .unwrap_or_else(|_| DEFAULT_C7_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            c7_tenant: non_empty(env::var("C7_TENANT").ok()),
            c7_auth_token: non_empty(env::var("C7_AUTH_TOKEN").ok()),
            c7_requests_per_second,
            excluded_vendors: split_list(
                &env::var("C7_EXCLUDED_VENDORS").unwrap_or_else(|_| "Tock".to_string()),
            ),
            excluded_associates: split_list(
                &env::var("C7_EXCLUDED_ASSOCIATES").unwrap_or_default(),
            ),

            demo_mode: env::var("DEMO_MODE")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            demo_seed,
        })
    }

    /// Configuration for an isolated in-memory instance
    #[cfg(test)]
    pub fn for_test() -> Self {
        Self {
            server_addr: "127.0.0.1:0".parse().expect("valid test address"),
            log_level: "debug".to_string(),
            log_json: false,
            run_mode: RunMode::Development,
            app_name: None,
            db_path: ":memory:".to_string(),
            c7_api_url: DEFAULT_C7_API_URL.to_string(),
            c7_tenant: Some("test-tenant".to_string()),
            c7_auth_token: Some("dGVzdDp0ZXN0".to_string()),
            c7_requests_per_second: 50,
            excluded_vendors: vec!["Tock".to_string()],
            excluded_associates: Vec::new(),
            demo_mode: false,
            demo_seed: Some(7),
        }
    }
}

fn run_mode_from(flask_env: Option<&str>, flask_debug: Option<&str>) -> RunMode {
    let debug = matches!(
        flask_debug.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1") | Some("true")
    );
    if debug || flask_env.map(str::trim) == Some("development") {
        RunMode::Development
    } else {
        RunMode::Production
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    Invalid(&'static str, String),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_mode_switches() {
        assert_eq!(run_mode_from(Some("development"), None), RunMode::Development);
        assert_eq!(run_mode_from(None, Some("1")), RunMode::Development);
        assert_eq!(run_mode_from(Some("production"), Some("TRUE")), RunMode::Development);
        assert_eq!(run_mode_from(Some("production"), Some("0")), RunMode::Production);
        assert_eq!(run_mode_from(None, None), RunMode::Production);
    }

    #[test]
    fn list_values_are_trimmed() {
        assert_eq!(split_list(" Tock, Resy ,,"), vec!["Tock", "Resy"]);
        assert!(split_list("").is_empty());
    }
}
