//! Service configuration settings and environment variable handling

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use crate::types::{FeeApplication, Priority};

// Configuration constants
pub const MIN_MINIMUM_RETURN_PERCENT: Decimal = dec!(0.1);
pub const MIN_DEFAULT_GAS_COST_USD: Decimal = dec!(0.1);
pub const MIN_DEFAULT_CAPITAL_USD: Decimal = dec!(1);
pub const MIN_HIGH_RETURN_MULTIPLIER: Decimal = dec!(1);
pub const DEFAULT_OPPORTUNITY_TTL_HOURS: i64 = 24;
pub const MAX_OPPORTUNITY_TTL_HOURS: i64 = 24 * 365;
pub const MIN_SCAN_TICK_SECS: u64 = 1;
pub const MAX_SCAN_TICK_SECS: u64 = 3_600;

// Scan scheduling defaults (seconds between scans)
pub const DEFAULT_HIGH_SCAN_SECS: u64 = 900; // 15 minutes
pub const DEFAULT_MEDIUM_SCAN_SECS: u64 = 3_600; // 1 hour
pub const DEFAULT_LOW_SCAN_SECS: u64 = 14_400; // 4 hours
pub const MIN_SCAN_FREQUENCY_SECS: u64 = 60;
pub const MAX_SCAN_FREQUENCY_SECS: u64 = 7 * 24 * 3_600; // 1 week

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(format!(
                "Environment must be one of development, staging, production (got {})",
                other
            )),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Thresholds for the high bucket of priority classification.
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityPolicy {
    /// High priority needs best return >= minimum_return_percent * multiplier
    pub high_return_multiplier: Decimal,
    pub high_min_confidence: Decimal,
}

impl Default for PriorityPolicy {
    fn default() -> Self {
        Self {
            high_return_multiplier: dec!(2),
            high_min_confidence: dec!(0.7),
        }
    }
}

/// Scan frequency per priority bucket, in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSchedule {
    pub high_secs: u64,
    pub medium_secs: u64,
    pub low_secs: u64,
}

impl ScanSchedule {
    pub fn frequency_secs(&self, priority: Priority) -> u64 {
        match priority {
            Priority::High => self.high_secs,
            Priority::Medium => self.medium_secs,
            Priority::Low => self.low_secs,
        }
    }
}

impl Default for ScanSchedule {
    fn default() -> Self {
        Self {
            high_secs: DEFAULT_HIGH_SCAN_SECS,
            medium_secs: DEFAULT_MEDIUM_SCAN_SECS,
            low_secs: DEFAULT_LOW_SCAN_SECS,
        }
    }
}

/// Everything the valuation functions read. Passed explicitly, never looked up globally.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationConfig {
    pub minimum_return_percent: Decimal,
    pub min_gross_spread_percent: Decimal,
    pub default_gas_cost_usd: Decimal,
    pub default_trading_fee_percent: Decimal,
    pub default_capital_usd: Decimal,
    pub default_confidence_score: Decimal,
    pub fee_application: FeeApplication,
    pub opportunity_ttl_hours: i64,
    pub priority: PriorityPolicy,
    pub schedule: ScanSchedule,
}

impl Default for ValuationConfig {
    fn default() -> Self {
        Self {
            minimum_return_percent: dec!(6.0),
            min_gross_spread_percent: dec!(1.5),
            default_gas_cost_usd: dec!(35.0),
            default_trading_fee_percent: dec!(0.6),
            default_capital_usd: dec!(5000),
            default_confidence_score: dec!(0.5),
            fee_application: FeeApplication::Combined,
            opportunity_ttl_hours: DEFAULT_OPPORTUNITY_TTL_HOURS,
            priority: PriorityPolicy::default(),
            schedule: ScanSchedule::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub log_level: String,
    pub log_format: LogFormat,
    pub output_dir: PathBuf,
    pub observations_path: PathBuf,
    pub scan_tick_secs: u64,
    pub valuation: ValuationConfig,
}

impl Config {
    pub fn load() -> Self {
        Self::from_source(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, so tests can inject values
    /// without touching the process environment.
    pub fn from_source<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let decimal = |key: &str, default: Decimal| {
            lookup(key)
                .and_then(|s| Decimal::from_str(s.trim()).ok())
                .unwrap_or(default)
        };
        let secs = |key: &str, default: u64| {
            lookup(key)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .unwrap_or(default)
                .clamp(MIN_SCAN_FREQUENCY_SECS, MAX_SCAN_FREQUENCY_SECS)
        };
        let defaults = ValuationConfig::default();

        let confidence_bound = |value: Decimal| value.max(Decimal::ZERO).min(Decimal::ONE);

        Self {
            environment: lookup("WIGGLE_ENVIRONMENT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(Environment::Development),
            log_level: lookup("WIGGLE_LOG_LEVEL")
                .or_else(|| lookup("LOG_LEVEL"))
                .unwrap_or_else(|| "info".to_string())
                .to_ascii_lowercase(),
            log_format: match lookup("WIGGLE_LOG_FORMAT").as_deref() {
                Some("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
            output_dir: lookup("WIGGLE_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output")),
            observations_path: lookup("WIGGLE_OBSERVATIONS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/observations.json")),
            scan_tick_secs: lookup("WIGGLE_SCAN_TICK_SECS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(5)
                .clamp(MIN_SCAN_TICK_SECS, MAX_SCAN_TICK_SECS),
            valuation: ValuationConfig {
                minimum_return_percent: decimal(
                    "WIGGLE_OPPORTUNITY_MINIMUM_RETURN_PERCENT",
                    defaults.minimum_return_percent,
                )
                .max(MIN_MINIMUM_RETURN_PERCENT),
                min_gross_spread_percent: decimal(
                    "WIGGLE_OPPORTUNITY_MIN_GROSS_SPREAD_PERCENT",
                    defaults.min_gross_spread_percent,
                )
                .max(Decimal::ZERO),
                default_gas_cost_usd: decimal(
                    "WIGGLE_OPPORTUNITY_DEFAULT_GAS_COST_USD",
                    defaults.default_gas_cost_usd,
                )
                .max(MIN_DEFAULT_GAS_COST_USD),
                default_trading_fee_percent: decimal(
                    "WIGGLE_OPPORTUNITY_DEFAULT_TRADING_FEE_PERCENT",
                    defaults.default_trading_fee_percent,
                )
                .max(Decimal::ZERO),
                default_capital_usd: decimal(
                    "WIGGLE_OPPORTUNITY_DEFAULT_CAPITAL_USD",
                    defaults.default_capital_usd,
                )
                .max(MIN_DEFAULT_CAPITAL_USD),
                default_confidence_score: confidence_bound(decimal(
                    "WIGGLE_OPPORTUNITY_DEFAULT_CONFIDENCE",
                    defaults.default_confidence_score,
                )),
                fee_application: lookup("WIGGLE_OPPORTUNITY_FEE_APPLICATION")
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.fee_application),
                opportunity_ttl_hours: lookup("WIGGLE_OPPORTUNITY_TTL_HOURS")
                    .and_then(|s| s.trim().parse::<i64>().ok())
                    .unwrap_or(DEFAULT_OPPORTUNITY_TTL_HOURS)
                    .clamp(1, MAX_OPPORTUNITY_TTL_HOURS),
                priority: PriorityPolicy {
                    high_return_multiplier: decimal(
                        "WIGGLE_PRIORITY_HIGH_RETURN_MULTIPLIER",
                        defaults.priority.high_return_multiplier,
                    )
                    .max(MIN_HIGH_RETURN_MULTIPLIER),
                    high_min_confidence: confidence_bound(decimal(
                        "WIGGLE_PRIORITY_HIGH_MIN_CONFIDENCE",
                        defaults.priority.high_min_confidence,
                    )),
                },
                schedule: ScanSchedule {
                    high_secs: secs("WIGGLE_SCAN_FREQUENCY_HIGH_SECS", DEFAULT_HIGH_SCAN_SECS),
                    medium_secs: secs("WIGGLE_SCAN_FREQUENCY_MEDIUM_SECS", DEFAULT_MEDIUM_SCAN_SECS),
                    low_secs: secs("WIGGLE_SCAN_FREQUENCY_LOW_SECS", DEFAULT_LOW_SCAN_SECS),
                },
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_source(|_| None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_source(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.valuation.minimum_return_percent, dec!(6.0));
        assert_eq!(config.valuation.default_gas_cost_usd, dec!(35.0));
        assert_eq!(config.valuation.default_trading_fee_percent, dec!(0.6));
        assert_eq!(config.valuation.fee_application, FeeApplication::Combined);
        assert_eq!(config.valuation.schedule.frequency_secs(Priority::Medium), 3_600);
    }

    #[test]
    fn values_are_read_from_the_injected_source() {
        let config = config_from(&[
            ("WIGGLE_ENVIRONMENT", "production"),
            ("WIGGLE_LOG_FORMAT", "json"),
            ("WIGGLE_OPPORTUNITY_MINIMUM_RETURN_PERCENT", "4.5"),
            ("WIGGLE_OPPORTUNITY_DEFAULT_GAS_COST_USD", "12"),
            ("WIGGLE_OPPORTUNITY_FEE_APPLICATION", "per_leg"),
            ("WIGGLE_SCAN_FREQUENCY_HIGH_SECS", "120"),
        ]);

        assert!(config.is_production());
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.valuation.minimum_return_percent, dec!(4.5));
        assert_eq!(config.valuation.default_gas_cost_usd, dec!(12));
        assert_eq!(config.valuation.fee_application, FeeApplication::PerLeg);
        assert_eq!(config.valuation.schedule.high_secs, 120);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = config_from(&[
            ("WIGGLE_OPPORTUNITY_MINIMUM_RETURN_PERCENT", "0"),
            ("WIGGLE_OPPORTUNITY_DEFAULT_CONFIDENCE", "3"),
            ("WIGGLE_SCAN_FREQUENCY_LOW_SECS", "5"),
            ("WIGGLE_ENVIRONMENT", "qa"),
        ]);

        assert_eq!(config.valuation.minimum_return_percent, MIN_MINIMUM_RETURN_PERCENT);
        assert_eq!(config.valuation.default_confidence_score, Decimal::ONE);
        assert_eq!(config.valuation.schedule.low_secs, MIN_SCAN_FREQUENCY_SECS);
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn oversized_durations_are_clamped() {
        let config = config_from(&[
            ("WIGGLE_SCAN_FREQUENCY_LOW_SECS", "18446744073709551615"),
            ("WIGGLE_SCAN_TICK_SECS", "9999999999"),
            ("WIGGLE_OPPORTUNITY_TTL_HOURS", "9223372036854775807"),
        ]);

        assert_eq!(config.valuation.schedule.low_secs, MAX_SCAN_FREQUENCY_SECS);
        assert_eq!(config.scan_tick_secs, MAX_SCAN_TICK_SECS);
        assert_eq!(config.valuation.opportunity_ttl_hours, MAX_OPPORTUNITY_TTL_HOURS);
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let config = config_from(&[("WIGGLE_OPPORTUNITY_DEFAULT_TRADING_FEE_PERCENT", "lots")]);
        assert_eq!(config.valuation.default_trading_fee_percent, dec!(0.6));
    }
}
