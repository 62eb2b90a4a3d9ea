//! Configuration management for LendingDesk
//!
//! This module handles loading and validating configuration from environment variables,
//! with support for different environments (development, staging, production, test).
//! Lending policy, overdue severity thresholds and statistics knobs live here too,
//! so the engine never hard-codes them.

use std::env;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::models::PersonType;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
    Test,
}

impl Environment {
    /// Parse environment from string
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, prod or test",
                s
            ))),
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Seeding and other startup side effects are skipped under test
    pub fn is_test(&self) -> bool {
        matches!(self, Environment::Test)
    }

    /// Get the environment name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::Development
    }
}

/// How long each kind of borrower keeps a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LendingPolicy {
    pub student_loan_days: i64,
    pub teacher_loan_days: i64,
}

/// Longest loan period the engine accepts, in days
pub const MAX_LOAN_DAYS: i64 = 365;

impl LendingPolicy {
    pub fn new(student_loan_days: i64, teacher_loan_days: i64) -> Result<Self, ConfigError> {
        for (key, days) in [
            ("STUDENT_LOAN_DAYS", student_loan_days),
            ("TEACHER_LOAN_DAYS", teacher_loan_days),
        ] {
            if !(1..=MAX_LOAN_DAYS).contains(&days) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be between 1 and {} (got {})",
                    key, MAX_LOAN_DAYS, days
                )));
            }
        }
        Ok(Self {
            student_loan_days,
            teacher_loan_days,
        })
    }

    /// Due date of a loan starting at `loan_date`, if it is representable
    pub fn due_date_for(
        &self,
        person_type: PersonType,
        loan_date: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let period = Duration::try_days(self.loan_days_for(person_type))?;
        loan_date.checked_add_signed(period)
    }

    pub fn loan_days_for(&self, person_type: PersonType) -> i64 {
        match person_type {
            PersonType::Student => self.student_loan_days,
            PersonType::Teacher => self.teacher_loan_days,
        }
    }
}

impl Default for LendingPolicy {
    fn default() -> Self {
        Self {
            student_loan_days: 14,
            teacher_loan_days: 30,
        }
    }
}

/// Lower bounds (inclusive, in days overdue) of the severity tiers above `low`.
/// `low` always starts at one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityThresholds {
    pub medium: i64,
    pub high: i64,
    pub critical: i64,
}

impl SeverityThresholds {
    pub fn new(medium: i64, high: i64, critical: i64) -> Result<Self, ConfigError> {
        if medium < 2 || high <= medium || critical <= high {
            return Err(ConfigError::InvalidValue(format!(
                "Severity thresholds must satisfy 2 <= medium < high < critical (got {}, {}, {})",
                medium, high, critical
            )));
        }
        Ok(Self {
            medium,
            high,
            critical,
        })
    }
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            medium: 7,
            high: 15,
            critical: 30,
        }
    }
}

/// Engine-level knobs shared by the services
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub lending: LendingPolicy,
    pub severity: SeverityThresholds,
    /// Size of the top resources / top borrowers lists
    pub stats_top_n: usize,
    pub default_page_size: u32,
    pub max_page_size: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            lending: LendingPolicy::default(),
            severity: SeverityThresholds::default(),
            stats_top_n: 5,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// Seconds to wait for a pooled connection
    pub db_acquire_timeout_secs: u64,

    /// Seconds an idle pooled connection is kept
    pub db_idle_timeout_secs: u64,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    /// Lending policy, severity tiers, statistics and paging defaults
    pub engine: EngineSettings,
}

fn parse_var<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse::<T>().map_err(|_| {
            ConfigError::InvalidValue(format!("{} must be a valid number (got '{}')", key, value))
        }),
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    parse_var(key, env::var(key).ok(), default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::from_str(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let db_max_connections = env_parse("DB_MAX_CONNECTIONS", 5u32)?;
        let db_acquire_timeout_secs = env_parse("DB_ACQUIRE_TIMEOUT_SECS", 5u64)?;
        let db_idle_timeout_secs = env_parse("DB_IDLE_TIMEOUT_SECS", 600u64)?;

        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS").ok();

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let defaults = EngineSettings::default();

        let lending = LendingPolicy::new(
            env_parse("STUDENT_LOAN_DAYS", defaults.lending.student_loan_days)?,
            env_parse("TEACHER_LOAN_DAYS", defaults.lending.teacher_loan_days)?,
        )?;

        let severity = SeverityThresholds::new(
            env_parse("OVERDUE_MEDIUM_DAYS", defaults.severity.medium)?,
            env_parse("OVERDUE_HIGH_DAYS", defaults.severity.high)?,
            env_parse("OVERDUE_CRITICAL_DAYS", defaults.severity.critical)?,
        )?;

        let default_page_size = env_parse("DEFAULT_PAGE_SIZE", defaults.default_page_size)?.max(1);
        let max_page_size =
            env_parse("MAX_PAGE_SIZE", defaults.max_page_size)?.max(default_page_size);
        let stats_top_n = env_parse("STATS_TOP_N", defaults.stats_top_n)?;

        Ok(Config {
            database_url,
            environment,
            port,
            db_max_connections,
            db_acquire_timeout_secs,
            db_idle_timeout_secs,
            cors_allowed_origins,
            log_level,
            engine: EngineSettings {
                lending,
                severity,
                stats_top_n,
                default_page_size,
                max_page_size,
            },
        })
    }

    /// Get database URL (useful for logging masked version)
    pub fn database_url_masked(&self) -> String {
        // Mask password in database URL for logging
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let prefix = &self.database_url[..colon_pos + 1];
                let suffix = &self.database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.database_url.clone()
    }
}
