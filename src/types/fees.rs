//! Fee application mode

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether the trading fee percent is charged once per opportunity or once per leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeApplication {
    #[default]
    Combined,
    PerLeg,
}

impl FromStr for FeeApplication {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "combined" => Ok(FeeApplication::Combined),
            "per_leg" | "per-leg" => Ok(FeeApplication::PerLeg),
            other => Err(format!("Unknown fee application: {}", other)),
        }
    }
}

impl fmt::Display for FeeApplication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeApplication::Combined => write!(f, "combined"),
            FeeApplication::PerLeg => write!(f, "per_leg"),
        }
    }
}
