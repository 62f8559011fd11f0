//! Tracked tokens

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const MAX_SYMBOL_LEN: usize = 20;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DECIMALS: u8 = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[default]
    Ethereum,
    Arbitrum,
    Optimism,
    Base,
    Polygon,
    Bsc,
    Avalanche,
    Solana,
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ethereum" => Ok(Chain::Ethereum),
            "arbitrum" => Ok(Chain::Arbitrum),
            "optimism" => Ok(Chain::Optimism),
            "base" => Ok(Chain::Base),
            "polygon" => Ok(Chain::Polygon),
            "bsc" => Ok(Chain::Bsc),
            "avalanche" => Ok(Chain::Avalanche),
            "solana" => Ok(Chain::Solana),
            other => Err(format!("Unknown chain: {}", other)),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Chain::Ethereum => "ethereum",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Base => "base",
            Chain::Polygon => "polygon",
            Chain::Bsc => "bsc",
            Chain::Avalanche => "avalanche",
            Chain::Solana => "solana",
        };
        write!(f, "{}", name)
    }
}

fn default_decimals() -> Option<u8> {
    Some(MAX_DECIMALS)
}

/// Fields for registering a token.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenDraft {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub chain: Chain,
    #[serde(default = "default_decimals")]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub coingecko_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

impl TokenDraft {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, chain: Chain) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            address: None,
            chain,
            decimals: default_decimals(),
            coingecko_id: None,
            tags: Vec::new(),
            notes: String::new(),
        }
    }

    /// Checks lengths and decimals; returns the reason on failure.
    pub fn check(&self) -> Result<(), String> {
        let symbol = self.symbol.trim();
        if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN {
            return Err(format!("symbol must be 1 to {} characters, got {:?}", MAX_SYMBOL_LEN, self.symbol));
        }
        let name = self.name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(format!("name must be 1 to {} characters", MAX_NAME_LEN));
        }
        if self.decimals.is_some_and(|decimals| decimals > MAX_DECIMALS) {
            return Err(format!("decimals must be at most {}", MAX_DECIMALS));
        }
        Ok(())
    }
}

/// A token tracked on one chain. Symbols are stored upper-case and are
/// unique per chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub address: Option<String>,
    pub chain: Chain,
    pub decimals: Option<u8>,
    pub coingecko_id: Option<String>,
    pub is_active: bool,
    pub tags: Vec<String>,
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Token {
    pub fn from_draft(draft: TokenDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: draft.symbol.trim().to_uppercase(),
            name: draft.name.trim().to_string(),
            address: draft.address,
            chain: draft.chain,
            decimals: draft.decimals,
            coingecko_id: draft.coingecko_id,
            is_active: true,
            tags: draft.tags,
            notes: draft.notes,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_checks_lengths_and_decimals() {
        assert!(TokenDraft::new("ETH", "Ethereum", Chain::Ethereum).check().is_ok());
        assert!(TokenDraft::new("  ", "Ethereum", Chain::Ethereum).check().is_err());
        assert!(TokenDraft::new("A".repeat(21), "Too long", Chain::Base).check().is_err());

        let mut draft = TokenDraft::new("USDC", "USD Coin", Chain::Arbitrum);
        draft.decimals = Some(19);
        assert!(draft.check().unwrap_err().contains("decimals"));
    }

    #[test]
    fn chain_round_trips_through_its_name() {
        assert_eq!("BSC".parse::<Chain>().unwrap(), Chain::Bsc);
        assert_eq!(Chain::Optimism.to_string(), "optimism");
        assert!("dogechain".parse::<Chain>().is_err());
    }
}
