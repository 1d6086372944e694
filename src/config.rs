use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::{Context, anyhow};
use dotenvy::dotenv;

use crate::model::attendance::{AttendanceType, ShiftType};
use crate::services::schedule::{
    DEFAULT_ATTENDANCE_TYPE_WINDOWS, DEFAULT_SHIFT_WINDOWS, ScheduleResolver, WindowTable,
};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Attendance proofs
    pub upload_dir: String,
    pub max_proof_bytes: usize,
    pub shift_windows: WindowTable<ShiftType>,
    pub attendance_type_windows: WindowTable<AttendanceType>,

    pub run_migrations: bool,
    pub log_dir: String,

    // First administrator, created only while the users table is empty
    pub bootstrap_admin: Option<(String, String)>,
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T>(key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("{key}={raw:?} is invalid: {e}"))
}

fn kilobytes(kb: usize) -> anyhow::Result<usize> {
    kb.checked_mul(1024)
        .ok_or_else(|| anyhow!("{kb} KB overflows the byte limit"))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parsed_or("ACCESS_TOKEN_TTL", "900")?, // 15 min
            refresh_token_ttl: parsed_or("REFRESH_TOKEN_TTL", "604800")?, // 7 days

            rate_login_per_min: parsed_or("RATE_LOGIN_PER_MIN", "60")?,
            rate_refresh_per_min: parsed_or("RATE_REFRESH_PER_MIN", "30")?,
            rate_protected_per_min: parsed_or("RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),

            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "./storage/public".to_string()),
            max_proof_bytes: kilobytes(parsed_or("MAX_PROOF_KB", "1502")?)
                .context("MAX_PROOF_KB")?,
            shift_windows: parsed_or("SHIFT_WINDOWS", DEFAULT_SHIFT_WINDOWS)?,
            attendance_type_windows: parsed_or(
                "ATTENDANCE_TYPE_WINDOWS",
                DEFAULT_ATTENDANCE_TYPE_WINDOWS,
            )?,

            run_migrations: parsed_or("RUN_MIGRATIONS", "true")?,
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),

            bootstrap_admin: match (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD")) {
                (Ok(user), Ok(password)) if !user.trim().is_empty() => {
                    Some((user.trim().to_string(), password))
                }
                _ => None,
            },
        })
    }

    pub fn schedule(&self) -> ScheduleResolver {
        ScheduleResolver::new(
            self.shift_windows.clone(),
            self.attendance_type_windows.clone(),
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Defaults without touching the process environment.
    pub fn test_config() -> Config {
        Config {
            database_url: "mysql://localhost/test".into(),
            jwt_secret: "test-secret".into(),
            server_addr: "127.0.0.1:0".into(),
            access_token_ttl: 900,
            refresh_token_ttl: 604800,
            rate_login_per_min: 60,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api".into(),
            upload_dir: "./storage/public".into(),
            max_proof_bytes: 1502 * 1024,
            shift_windows: DEFAULT_SHIFT_WINDOWS.parse().unwrap(),
            attendance_type_windows: DEFAULT_ATTENDANCE_TYPE_WINDOWS.parse().unwrap(),
            run_migrations: false,
            log_dir: "logs".into(),
            bootstrap_admin: None,
        }
    }

    #[test]
    fn default_windows_parse() {
        let config = test_config();
        assert_eq!(config.shift_windows.windows().len(), 2);
        assert_eq!(config.attendance_type_windows.windows().len(), 4);
        assert_eq!(config.max_proof_bytes, 1502 * 1024);
    }

    #[test]
    fn proof_limit_overflow_is_a_config_error() {
        assert_eq!(kilobytes(1502).unwrap(), 1502 * 1024);
        assert!(kilobytes(usize::MAX).is_err());
    }

    #[test]
    fn parse_errors_name_the_variable() {
        let err = parsed_or::<u32>("HR_ATTENDANCE_TEST_UNSET_VAR", "many").unwrap_err();
        assert!(err.to_string().contains("HR_ATTENDANCE_TEST_UNSET_VAR"));
    }
}
