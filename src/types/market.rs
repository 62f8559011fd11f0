//! Raw market observations and exchange pair keys

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// One price print for a token on one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketObservation {
    pub exchange: String,
    pub symbol: String,
    pub price: Decimal,
    #[serde(default)]
    pub volume_24h: Decimal,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub confidence: Option<Decimal>,
}

/// Unordered pair of exchanges; the smaller name is always stored first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExchangePairKey {
    first: String,
    second: String,
}

impl ExchangePairKey {
    pub const SEPARATOR: char = '/';

    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Self {
        let (a, b) = (a.into(), b.into());
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    pub fn first(&self) -> &str {
        &self.first
    }

    pub fn second(&self) -> &str {
        &self.second
    }

    pub fn contains(&self, exchange: &str) -> bool {
        self.first == exchange || self.second == exchange
    }
}

impl fmt::Display for ExchangePairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.first, Self::SEPARATOR, self.second)
    }
}

impl FromStr for ExchangePairKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(Self::SEPARATOR) {
            Some((a, b)) if !a.is_empty() && !b.is_empty() && a != b => Ok(Self::new(a, b)),
            _ => Err(format!("Invalid exchange pair key: {}", s)),
        }
    }
}

impl Serialize for ExchangePairKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ExchangePairKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
