//! Process configuration, read once from the environment at startup.

use std::time::Duration;

use thiserror::Error;

use reskill_auth::SessionLifetimes;
use reskill_infra::mail::SmtpConfig;
use reskill_observability::{LogConfig, LogFormat};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("{0} is required")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Local,
    Development,
    Testing,
    Production,
}

impl AppEnv {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "local" => Some(Self::Local),
            "development" | "dev" => Some(Self::Development),
            "testing" | "test" => Some(Self::Testing),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    /// Whether the verbatim domain-event mirror is registered.
    pub fn mirrors_events(self) -> bool {
        matches!(self, Self::Local | Self::Development)
    }
}

/// Administrator created at startup if it does not exist yet.
#[derive(Clone)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl core::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AdminSeed")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: AppEnv,
    pub bind: String,
    /// Base URL for invitation links, without trailing slash.
    pub public_url: Option<String>,
    pub lifetimes: SessionLifetimes,
    pub secure_cookies: bool,
    /// `None` selects the log-only mailer.
    pub smtp: Option<SmtpConfig>,
    pub slow_job_threshold: Duration,
    pub processing_job_marker: String,
    pub log: LogConfig,
    pub admin_seed: Option<AdminSeed>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            env: AppEnv::Production,
            bind: "0.0.0.0:8080".to_string(),
            public_url: None,
            lifetimes: SessionLifetimes::default(),
            secure_cookies: true,
            smtp: None,
            slow_job_threshold: Duration::from_secs(300),
            processing_job_marker: "processing.".to_string(),
            log: LogConfig::default(),
            admin_seed: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let env = match get("APP_ENV") {
            Some(raw) => AppEnv::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                var: "APP_ENV",
                reason: format!("unknown environment {raw:?}"),
            })?,
            None => defaults.env,
        };

        let lifetimes = SessionLifetimes {
            session: parse_lifetime(
                &get,
                "SESSION_LIFETIME_MINUTES",
                120,
                MAX_SESSION_MINUTES,
                chrono::Duration::try_minutes,
            )?,
            remember: parse_lifetime(
                &get,
                "REMEMBER_LIFETIME_DAYS",
                30,
                MAX_REMEMBER_DAYS,
                chrono::Duration::try_days,
            )?,
        };

        let secure_cookies = match get("SESSION_SECURE_COOKIE") {
            Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
                var: "SESSION_SECURE_COOKIE",
                reason: "expected true or false".to_string(),
            })?,
            None => defaults.secure_cookies,
        };

        let smtp = match get("MAIL_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse_number(&get, "MAIL_PORT", 587)?,
                username: get("MAIL_USERNAME"),
                password: get("MAIL_PASSWORD"),
                from_address: get("MAIL_FROM_ADDRESS").ok_or(ConfigError::Missing("MAIL_FROM_ADDRESS"))?,
                from_name: get("MAIL_FROM_NAME").unwrap_or_else(|| "Reskilling".to_string()),
            }),
            None => None,
        };

        let log = LogConfig {
            format: match get("LOG_FORMAT") {
                Some(raw) => LogFormat::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                    var: "LOG_FORMAT",
                    reason: "expected json or pretty".to_string(),
                })?,
                None => defaults.log.format,
            },
            ..defaults.log
        };

        let admin_seed = match (get("ADMIN_EMAIL"), get("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                name: get("ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
                email,
                password,
            }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing("ADMIN_PASSWORD")),
            (None, Some(_)) => return Err(ConfigError::Missing("ADMIN_EMAIL")),
        };

        Ok(Self {
            env,
            bind: get("APP_BIND").unwrap_or(defaults.bind),
            public_url: get("APP_PUBLIC_URL").map(|u| u.trim().trim_end_matches('/').to_string()),
            lifetimes,
            secure_cookies,
            smtp,
            slow_job_threshold: Duration::from_secs(parse_number(
                &get,
                "SLOW_JOB_THRESHOLD_SECS",
                300,
            )?),
            processing_job_marker: get("PROCESSING_JOB_MARKER")
                .unwrap_or(defaults.processing_job_marker),
            log,
            admin_seed,
        })
    }
}

fn parse_number<T>(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match get(var) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// One week.
const MAX_SESSION_MINUTES: i64 = 7 * 24 * 60;
/// About ten years.
const MAX_REMEMBER_DAYS: i64 = 3650;

/// A lifetime in whole units, between 1 and `max` inclusive.
fn parse_lifetime(
    get: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: i64,
    max: i64,
    unit: fn(i64) -> Option<chrono::Duration>,
) -> Result<chrono::Duration, ConfigError> {
    let value: i64 = parse_number(get, var, default)?;
    if !(1..=max).contains(&value) {
        return Err(ConfigError::Invalid {
            var,
            reason: format!("must be between 1 and {max}"),
        });
    }
    unit(value).ok_or_else(|| ConfigError::Invalid {
        var,
        reason: "out of range".to_string(),
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
