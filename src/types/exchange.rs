//! Exchanges and their request health

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use super::Chain;

/// An exchange with this many failures in a row is unhealthy.
pub const UNHEALTHY_CONSECUTIVE_ERRORS: u32 = 3;
pub const DEFAULT_RATE_LIMIT_PER_MINUTE: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeType {
    Cex,
    Dex,
}

impl FromStr for ExchangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cex" => Ok(ExchangeType::Cex),
            "dex" => Ok(ExchangeType::Dex),
            other => Err(format!("Exchange type must be cex or dex (got {})", other)),
        }
    }
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeType::Cex => write!(f, "cex"),
            ExchangeType::Dex => write!(f, "dex"),
        }
    }
}

fn default_rate_limit() -> u32 {
    DEFAULT_RATE_LIMIT_PER_MINUTE
}

fn default_true() -> bool {
    true
}

/// Fields for registering an exchange.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExchangeDraft {
    pub name: String,
    pub exchange_type: ExchangeType,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_true")]
    pub supports_historical_data: bool,
    #[serde(default)]
    pub supports_websocket: bool,
    #[serde(default)]
    pub supported_chains: Vec<Chain>,
}

impl ExchangeDraft {
    pub fn new(name: impl Into<String>, exchange_type: ExchangeType) -> Self {
        Self {
            name: name.into(),
            exchange_type,
            api_endpoint: None,
            rate_limit_per_minute: DEFAULT_RATE_LIMIT_PER_MINUTE,
            supports_historical_data: true,
            supports_websocket: false,
            supported_chains: Vec::new(),
        }
    }

    pub fn check(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.rate_limit_per_minute < 1 {
            return Err("rate_limit_per_minute must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub id: String,
    pub name: String,
    pub exchange_type: ExchangeType,
    pub api_endpoint: Option<String>,
    pub rate_limit_per_minute: u32,
    pub is_active: bool,
    pub last_successful_request: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_errors: u32,
    pub total_requests: u64,
    pub total_errors: u64,
    pub average_response_time_ms: Option<u64>,
    pub supports_historical_data: bool,
    pub supports_websocket: bool,
    pub supported_chains: Vec<Chain>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exchange {
    pub fn from_draft(draft: ExchangeDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: draft.name.trim().to_string(),
            exchange_type: draft.exchange_type,
            api_endpoint: draft.api_endpoint,
            rate_limit_per_minute: draft.rate_limit_per_minute,
            is_active: true,
            last_successful_request: None,
            last_error: None,
            consecutive_errors: 0,
            total_requests: 0,
            total_errors: 0,
            average_response_time_ms: None,
            supports_historical_data: draft.supports_historical_data,
            supports_websocket: draft.supports_websocket,
            supported_chains: draft.supported_chains,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn record_success(&mut self, response_time_ms: Option<u64>, now: DateTime<Utc>) {
        self.total_requests = self.total_requests.saturating_add(1);
        self.consecutive_errors = 0;
        self.last_successful_request = Some(now);
        self.updated_at = now;

        if let Some(sample) = response_time_ms {
            let successes = self.total_requests.saturating_sub(self.total_errors).max(1);
            self.average_response_time_ms = Some(match self.average_response_time_ms {
                // running mean over successful requests
                Some(average) => {
                    let total = u128::from(average) * u128::from(successes - 1) + u128::from(sample);
                    u64::try_from(total / u128::from(successes)).unwrap_or(u64::MAX)
                }
                None => sample,
            });
        }
    }

    pub fn record_error(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.total_requests = self.total_requests.saturating_add(1);
        self.total_errors = self.total_errors.saturating_add(1);
        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
        self.last_error = Some(error.into());
        self.updated_at = now;
    }

    pub fn is_healthy(&self) -> bool {
        self.is_active && self.consecutive_errors < UNHEALTHY_CONSECUTIVE_ERRORS
    }
}
