use anyhow::{anyhow, bail, Result};
use std::env;
use std::fmt::Display;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration as StdDuration;

/// Which backend the storage adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Mongo,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(StoreBackend::Sqlite),
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_backend: StoreBackend,
    pub sqlite_db_path: PathBuf,
    pub mongo_uri: Option<String>,
    pub mongo_db_name: String,
    pub connect_retries: u32,
    pub retry_backoff: StdDuration,
    pub model_path: PathBuf,
    pub reports_csv_path: PathBuf,
    pub jwt_secret: String,
    pub password_hash_cost: u32,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(AppConfig {
            store_backend: EnvVars::store_backend()?,
            sqlite_db_path: EnvVars::sqlite_db_path(),
            mongo_uri: EnvVars::mongo_uri(),
            mongo_db_name: EnvVars::mongo_db_name(),
            connect_retries: EnvVars::connect_retries()?,
            retry_backoff: EnvVars::retry_backoff()?,
            model_path: EnvVars::model_path(),
            reports_csv_path: EnvVars::reports_csv_path(),
            jwt_secret: EnvVars::jwt_secret()?,
            password_hash_cost: EnvVars::password_hash_cost()?,
            bind_addr: EnvVars::bind_addr()?,
        })
    }
}

pub struct EnvVars;

impl EnvVars {
    pub fn store_backend() -> Result<StoreBackend> {
        env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "sqlite".to_string())
            .parse()
            .map_err(|e: String| anyhow!("STORE_BACKEND: {e}"))
    }

    pub fn sqlite_db_path() -> PathBuf {
        env::var("SQLITE_DB_PATH")
            .unwrap_or_else(|_| Constants::DEFAULT_SQLITE_PATH.to_string())
            .into()
    }

    pub fn mongo_uri() -> Option<String> {
        env::var("MONGO_URI").ok().filter(|uri| !uri.trim().is_empty())
    }

    pub fn mongo_db_name() -> String {
        env::var("MONGO_DBNAME").unwrap_or_else(|_| Constants::DEFAULT_DB_NAME.to_string())
    }

    pub fn connect_retries() -> Result<u32> {
        parse_setting(
            "STORE_CONNECT_RETRIES",
            env::var("STORE_CONNECT_RETRIES").ok(),
            Constants::DEFAULT_CONNECT_RETRIES,
        )
    }

    pub fn retry_backoff() -> Result<StdDuration> {
        let millis = parse_setting(
            "STORE_RETRY_BACKOFF_MS",
            env::var("STORE_RETRY_BACKOFF_MS").ok(),
            Constants::DEFAULT_RETRY_BACKOFF_MS,
        )?;
        Ok(StdDuration::from_millis(millis))
    }

    pub fn model_path() -> PathBuf {
        env::var("MODEL_PATH")
            .unwrap_or_else(|_| Constants::DEFAULT_MODEL_PATH.to_string())
            .into()
    }

    pub fn reports_csv_path() -> PathBuf {
        env::var("REPORTS_CSV_PATH")
            .unwrap_or_else(|_| Constants::DEFAULT_REPORTS_CSV_PATH.to_string())
            .into()
    }

    pub fn jwt_secret() -> Result<String> {
        match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => Ok(secret),
            _ => bail!("JWT_SECRET not set"),
        }
    }

    pub fn password_hash_cost() -> Result<u32> {
        parse_setting(
            "PASSWORD_HASH_COST",
            env::var("PASSWORD_HASH_COST").ok(),
            bcrypt::DEFAULT_COST,
        )
    }

    pub fn bind_addr() -> Result<SocketAddr> {
        parse_setting(
            "BIND_ADDR",
            env::var("BIND_ADDR").ok(),
            SocketAddr::from(([0, 0, 0, 0], Constants::DEFAULT_PORT)),
        )
    }
}

/// Parses an optional raw setting, falling back to `default` when it is unset
/// or blank.
pub fn parse_setting<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match raw {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key}: invalid value '{value}': {e}")),
        _ => Ok(default),
    }
}

pub struct Constants;

impl Constants {
    pub const DEFAULT_SQLITE_PATH: &'static str = "healthcore.db";

    pub const DEFAULT_DB_NAME: &'static str = "healthcore";

    pub const DEFAULT_MODEL_PATH: &'static str = "models/health_risk_prediction_model.json";

    pub const DEFAULT_REPORTS_CSV_PATH: &'static str = "database/reports.csv";

    pub const DEFAULT_PORT: u16 = 5000;

    pub const DEFAULT_CONNECT_RETRIES: u32 = 5;

    pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;

    pub const MAX_SIGNUP_ATTEMPTS: usize = 30;

    pub const RATE_LIMIT_WINDOW: StdDuration = StdDuration::from_secs(60 * 60);

    pub const TOKEN_TTL_HOURS: i64 = 2;

    /// Page size of the generic `/data/*` listings.
    pub const DATA_LIST_LIMIT: i64 = 20;

    /// Default page size of `/api/reports` and `/api/alerts`.
    pub const REPORT_LIST_LIMIT: i64 = 200;

    pub const MAX_LIST_LIMIT: i64 = 1000;
}
