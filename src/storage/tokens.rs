//! In-memory token registry

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use super::{Page, PageRequest};
use crate::{
    errors::{StoreError, StoreResult},
    types::{Chain, Token, TokenDraft},
};

const COLLECTION: &str = "token";
pub const MAX_SEARCH_LIMIT: usize = 50;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenFilter {
    /// Case-insensitive substring of the symbol.
    pub symbol: Option<String>,
    pub chain: Option<Chain>,
    pub is_active: Option<bool>,
}

impl TokenFilter {
    pub fn matches(&self, token: &Token) -> bool {
        if let Some(fragment) = &self.symbol {
            if !token.symbol.contains(&fragment.trim().to_uppercase()) {
                return false;
            }
        }
        if self.chain.is_some_and(|chain| chain != token.chain) {
            return false;
        }
        if self.is_active.is_some_and(|active| active != token.is_active) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    tokens: Arc<RwLock<HashMap<String, Token>>>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a token. A symbol may exist once per chain.
    pub async fn create(&self, draft: TokenDraft, now: DateTime<Utc>) -> StoreResult<Token> {
        draft.check().map_err(|reason| StoreError::InvalidDocument {
            collection: COLLECTION,
            reason,
        })?;
        let token = Token::from_draft(draft, now);

        let mut tokens = self.tokens.write().await;
        if tokens
            .values()
            .any(|existing| existing.symbol == token.symbol && existing.chain == token.chain)
        {
            return Err(StoreError::Duplicate {
                collection: COLLECTION,
                id: format!("{} on {}", token.symbol, token.chain),
            });
        }

        info!(token_id = %token.id, symbol = %token.symbol, chain = %token.chain, "Registered token");
        tokens.insert(token.id.clone(), token.clone());
        Ok(token)
    }

    /// Returns the token for `symbol` on `chain`, registering it first if needed.
    pub async fn ensure(&self, draft: TokenDraft, now: DateTime<Utc>) -> StoreResult<Token> {
        if let Some(existing) = self.find(&draft.symbol, draft.chain).await {
            return Ok(existing);
        }
        let (symbol, chain) = (draft.symbol.clone(), draft.chain);
        match self.create(draft, now).await {
            // registered concurrently between the lookup and the insert
            Err(StoreError::Duplicate { id, .. }) => self
                .find(&symbol, chain)
                .await
                .ok_or(StoreError::NotFound { collection: COLLECTION, id }),
            other => other,
        }
    }

    pub async fn find(&self, symbol: &str, chain: Chain) -> Option<Token> {
        let symbol = symbol.trim().to_uppercase();
        self.tokens
            .read()
            .await
            .values()
            .find(|token| token.symbol == symbol && token.chain == chain)
            .cloned()
    }

    pub async fn get(&self, id: &str) -> StoreResult<Token> {
        self.tokens
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                collection: COLLECTION,
                id: id.to_string(),
            })
    }

    /// Sorted by symbol, then chain.
    pub async fn list(&self, filter: &TokenFilter, request: PageRequest) -> StoreResult<Page<Token>> {
        request.validate()?;
        let mut matching: Vec<Token> = self
            .tokens
            .read()
            .await
            .values()
            .filter(|token| filter.matches(token))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.symbol.cmp(&b.symbol).then_with(|| a.chain.cmp(&b.chain)));
        Page::from_sorted(matching, request)
    }

    /// Active tokens whose symbol contains `fragment`, case-insensitively.
    pub async fn search(&self, fragment: &str, limit: usize) -> StoreResult<Vec<Token>> {
        if limit < 1 || limit > MAX_SEARCH_LIMIT {
            return Err(StoreError::InvalidLimit {
                limit,
                max: MAX_SEARCH_LIMIT,
            });
        }
        let filter = TokenFilter {
            symbol: Some(fragment.to_string()),
            is_active: Some(true),
            ..TokenFilter::default()
        };
        let page = self.list(&filter, PageRequest::new(1, limit)?).await?;
        Ok(page.items)
    }

    pub async fn set_active(&self, id: &str, is_active: bool, now: DateTime<Utc>) -> StoreResult<Token> {
        let mut tokens = self.tokens.write().await;
        let token = tokens.get_mut(id).ok_or_else(|| StoreError::NotFound {
            collection: COLLECTION,
            id: id.to_string(),
        })?;
        token.is_active = is_active;
        token.updated_at = now;
        info!(token_id = %id, symbol = %token.symbol, is_active, "Updated token status");
        Ok(token.clone())
    }

    pub async fn len(&self) -> usize {
        self.tokens.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tokens.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn symbol_is_unique_per_chain() {
        let store = TokenStore::new();
        store.create(TokenDraft::new("usdc", "USD Coin", Chain::Ethereum), now()).await.unwrap();
        store.create(TokenDraft::new("USDC", "USD Coin", Chain::Arbitrum), now()).await.unwrap();

        let err = store
            .create(TokenDraft::new(" USDC ", "USD Coin", Chain::Ethereum), now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { collection: "token", .. }));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn invalid_draft_is_rejected() {
        let store = TokenStore::new();
        let err = store.create(TokenDraft::new("", "Nameless", Chain::Base), now()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument { collection: "token", .. }));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn ensure_returns_the_registered_token() {
        let store = TokenStore::new();
        let first = store.ensure(TokenDraft::new("eth", "Ethereum", Chain::Ethereum), now()).await.unwrap();
        let again = store.ensure(TokenDraft::new("ETH", "Ether", Chain::Ethereum), now()).await.unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(again.name, "Ethereum");
        assert_eq!(store.get(&first.id).await.unwrap().symbol, "ETH");
        assert!(matches!(store.get("missing").await, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_and_search_honour_filters() {
        let store = TokenStore::new();
        for (symbol, chain) in [("WETH", Chain::Ethereum), ("ETH", Chain::Ethereum), ("STETH", Chain::Base), ("SOL", Chain::Solana)] {
            store.create(TokenDraft::new(symbol, symbol, chain), now()).await.unwrap();
        }
        let steth = store.find("steth", Chain::Base).await.unwrap();
        store.set_active(&steth.id, false, now()).await.unwrap();

        let on_ethereum = TokenFilter {
            chain: Some(Chain::Ethereum),
            ..TokenFilter::default()
        };
        let page = store.list(&on_ethereum, PageRequest::default()).await.unwrap();
        let symbols: Vec<_> = page.items.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ETH", "WETH"]);

        let found = store.search("eth", 10).await.unwrap();
        let symbols: Vec<_> = found.iter().map(|t| t.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["ETH", "WETH"]);

        assert!(matches!(store.search("eth", 0).await, Err(StoreError::InvalidLimit { limit: 0, max: 50 })));
        assert!(store.search("eth", 51).await.is_err());
    }
}
