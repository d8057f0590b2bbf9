use rust_decimal::Decimal;
use std::env;
use std::fmt;
use std::str::FromStr;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the engine and the worker.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub scheduler: SchedulerConfig,
    pub alerts: AlertBands,
    pub billing: BillingConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let interval_hours = read_var::<u64>("APP_SWEEP_INTERVAL_HOURS", 24)?;
        if interval_hours == 0 {
            return Err(ConfigError::Invalid {
                var: "APP_SWEEP_INTERVAL_HOURS",
            });
        }

        let alerts = AlertBands {
            urgent_days: read_var("APP_ALERT_URGENT_DAYS", 7)?,
            important_days: read_var("APP_ALERT_IMPORTANT_DAYS", 15)?,
            horizon_days: read_var("APP_ALERT_HORIZON_DAYS", 30)?,
            compliance_deadline_days: read_var("APP_COMPLIANCE_DEADLINE_DAYS", 7)?,
        };
        alerts.validate()?;

        let default_hourly_rate = match env::var("APP_DEFAULT_HOURLY_RATE") {
            Ok(raw) => Decimal::from_str(raw.trim()).map_err(|_| ConfigError::Invalid {
                var: "APP_DEFAULT_HOURLY_RATE",
            })?,
            Err(_) => BillingConfig::default().default_hourly_rate,
        };

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            scheduler: SchedulerConfig { interval_hours },
            alerts,
            billing: BillingConfig {
                default_hourly_rate,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

fn read_var<T: FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var }),
        Err(_) => Ok(default),
    }
}

/// How often the worker triggers the periodic sweeps.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval_hours: u64,
}

/// Deadline bands shared by every date-driven alert sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertBands {
    pub urgent_days: i64,
    pub important_days: i64,
    pub horizon_days: i64,
    pub compliance_deadline_days: i64,
}

impl AlertBands {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.urgent_days < 0
            || self.urgent_days >= self.important_days
            || self.important_days >= self.horizon_days
        {
            return Err(ConfigError::UnorderedAlertBands {
                urgent: self.urgent_days,
                important: self.important_days,
                horizon: self.horizon_days,
            });
        }
        if self.compliance_deadline_days < 0 {
            return Err(ConfigError::Invalid {
                var: "APP_COMPLIANCE_DEADLINE_DAYS",
            });
        }
        Ok(())
    }
}

impl Default for AlertBands {
    fn default() -> Self {
        Self {
            urgent_days: 7,
            important_days: 15,
            horizon_days: 30,
            compliance_deadline_days: 7,
        }
    }
}

/// Billing defaults applied when a contract or intervention leaves a value unset.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingConfig {
    pub default_hourly_rate: Decimal,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            default_hourly_rate: Decimal::from(75),
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid {
        var: &'static str,
    },
    UnorderedAlertBands {
        urgent: i64,
        important: i64,
        horizon: i64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { var } => write!(f, "{var} has an invalid value"),
            ConfigError::UnorderedAlertBands {
                urgent,
                important,
                horizon,
            } => write!(
                f,
                "alert bands must increase strictly (urgent {urgent}, important {important}, horizon {horizon})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
