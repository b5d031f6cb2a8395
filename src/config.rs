use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::crypto::PBKDF2_ITERATIONS;

/// Application-level constants
pub const APP_NAME: &str = "Medinest";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:4444";
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "medinest_lib=info,medinest=info,tower_http=warn"
}

/// ~/Medinest/ on all platforms. `None` when no home directory can be found.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_NAME))
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("Cannot determine home directory; set MEDINEST_DB_PATH")]
    NoHomeDir,
}

/// Optional text-completion backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    pub url: String,
    pub model: String,
    pub timeout: Duration,
}

/// Runtime configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: Vec<u8>,
    pub patient_token_ttl: chrono::Duration,
    pub doctor_token_ttl: chrono::Duration,
    /// Live sessions kept per principal; 1 means a new login supersedes the last.
    pub max_sessions: u32,
    pub password_iterations: u32,
    pub completion: Option<CompletionConfig>,
    pub cors_origin: Option<String>,
    pub rate_per_minute: u32,
    pub rate_per_hour: u32,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let bind_addr = match get("MEDINEST_BIND_ADDR") {
            Some(raw) => raw.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    var: "MEDINEST_BIND_ADDR",
                    reason: e.to_string(),
                }
            })?,
            None => DEFAULT_BIND_ADDR.parse().map_err(|e: std::net::AddrParseError| {
                ConfigError::Invalid {
                    var: "MEDINEST_BIND_ADDR",
                    reason: e.to_string(),
                }
            })?,
        };

        let db_path = match get("MEDINEST_DB_PATH") {
            Some(raw) => PathBuf::from(raw),
            None => app_data_dir()
                .ok_or(ConfigError::NoHomeDir)?
                .join("medinest.db"),
        };

        let jwt_secret = get("MEDINEST_JWT_SECRET")
            .ok_or(ConfigError::Missing("MEDINEST_JWT_SECRET"))?
            .into_bytes();
        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "MEDINEST_JWT_SECRET",
                reason: format!("must be at least {MIN_JWT_SECRET_LEN} bytes"),
            });
        }

        let patient_ttl_hours = parse_number(&get, "MEDINEST_PATIENT_TOKEN_TTL_HOURS", 168)?;
        let doctor_ttl_hours = parse_number(&get, "MEDINEST_DOCTOR_TOKEN_TTL_HOURS", 24)?;
        let max_sessions = parse_number(&get, "MEDINEST_MAX_SESSIONS", 1)?;
        let password_iterations =
            parse_number(&get, "MEDINEST_PASSWORD_ITERATIONS", PBKDF2_ITERATIONS)?;
        let timeout_secs = parse_number(&get, "MEDINEST_COMPLETION_TIMEOUT_SECS", 60)?;

        for (var, value) in [
            ("MEDINEST_PATIENT_TOKEN_TTL_HOURS", patient_ttl_hours),
            ("MEDINEST_DOCTOR_TOKEN_TTL_HOURS", doctor_ttl_hours),
            ("MEDINEST_MAX_SESSIONS", max_sessions),
            ("MEDINEST_PASSWORD_ITERATIONS", password_iterations),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    var,
                    reason: "must be greater than zero".into(),
                });
            }
        }

        let completion = get("MEDINEST_COMPLETION_URL").map(|url| CompletionConfig {
            url: url.trim_end_matches('/').to_string(),
            model: get("MEDINEST_COMPLETION_MODEL").unwrap_or_else(|| "llama3".into()),
            timeout: Duration::from_secs(u64::from(timeout_secs)),
        });

        Ok(Self {
            bind_addr,
            db_path,
            jwt_secret,
            patient_token_ttl: chrono::Duration::hours(i64::from(patient_ttl_hours)),
            doctor_token_ttl: chrono::Duration::hours(i64::from(doctor_ttl_hours)),
            max_sessions,
            password_iterations,
            completion,
            cors_origin: get("MEDINEST_CORS_ORIGIN"),
            rate_per_minute: parse_number(&get, "MEDINEST_RATE_PER_MINUTE", 100)?,
            rate_per_hour: parse_number(&get, "MEDINEST_RATE_PER_HOUR", 1000)?,
        })
    }

    /// Fast settings for tests: cheap password hashing, fixed secret.
    pub fn for_tests(db_path: &Path) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            db_path: db_path.to_path_buf(),
            jwt_secret: b"medinest-test-secret-with-32-bytes!!".to_vec(),
            patient_token_ttl: chrono::Duration::hours(168),
            doctor_token_ttl: chrono::Duration::hours(24),
            max_sessions: 1,
            password_iterations: 1_000,
            completion: None,
            cors_origin: None,
            rate_per_minute: 1_000,
            rate_per_hour: 10_000,
        }
    }
}

fn parse_number<G>(get: &G, var: &'static str, default: u32) -> Result<u32, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e: std::num::ParseIntError| {
            ConfigError::Invalid {
                var,
                reason: e.to_string(),
            }
        }),
        None => Ok(default),
    }
}
