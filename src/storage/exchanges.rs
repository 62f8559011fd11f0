//! In-memory exchange registry and request health

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};
use super::{Page, PageRequest};
use crate::{
    errors::{StoreError, StoreResult},
    types::{Exchange, ExchangeDraft, ExchangeType, UNHEALTHY_CONSECUTIVE_ERRORS},
};

const COLLECTION: &str = "exchange";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeFilter {
    pub exchange_type: Option<ExchangeType>,
    pub is_active: Option<bool>,
}

impl ExchangeFilter {
    pub fn matches(&self, exchange: &Exchange) -> bool {
        if self.exchange_type.is_some_and(|kind| kind != exchange.exchange_type) {
            return false;
        }
        if self.is_active.is_some_and(|active| active != exchange.is_active) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnhealthyExchange {
    pub name: String,
    pub consecutive_errors: u32,
    pub last_error: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeHealthSummary {
    pub total_exchanges: usize,
    pub active_exchanges: usize,
    pub healthy_exchanges: usize,
    pub total_requests: u64,
    pub total_errors: u64,
    /// Errors over requests, in percent to 2 dp. Zero before any request.
    pub error_rate_percent: Decimal,
    pub unhealthy_exchanges: Vec<UnhealthyExchange>,
}

/// Exchange documents keyed by name.
#[derive(Debug, Clone, Default)]
pub struct ExchangeStore {
    exchanges: Arc<RwLock<HashMap<String, Exchange>>>,
}

impl ExchangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, draft: ExchangeDraft, now: DateTime<Utc>) -> StoreResult<Exchange> {
        draft.check().map_err(|reason| StoreError::InvalidDocument {
            collection: COLLECTION,
            reason,
        })?;
        let exchange = Exchange::from_draft(draft, now);

        let mut exchanges = self.exchanges.write().await;
        if exchanges.contains_key(&exchange.name) {
            return Err(StoreError::Duplicate {
                collection: COLLECTION,
                id: exchange.name,
            });
        }

        info!(
            exchange = %exchange.name,
            exchange_type = %exchange.exchange_type,
            rate_limit = exchange.rate_limit_per_minute,
            "Registered exchange"
        );
        exchanges.insert(exchange.name.clone(), exchange.clone());
        Ok(exchange)
    }

    pub async fn get(&self, name: &str) -> StoreResult<Exchange> {
        self.exchanges
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                collection: COLLECTION,
                id: name.to_string(),
            })
    }

    /// Sorted by name.
    pub async fn list(&self, filter: &ExchangeFilter, request: PageRequest) -> StoreResult<Page<Exchange>> {
        request.validate()?;
        let mut matching: Vec<Exchange> = self
            .exchanges
            .read()
            .await
            .values()
            .filter(|exchange| filter.matches(exchange))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Page::from_sorted(matching, request)
    }

    pub async fn record_success(
        &self,
        name: &str,
        response_time_ms: Option<u64>,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let mut exchanges = self.exchanges.write().await;
        let exchange = exchanges.get_mut(name).ok_or_else(|| StoreError::NotFound {
            collection: COLLECTION,
            id: name.to_string(),
        })?;
        exchange.record_success(response_time_ms, now);
        Ok(())
    }

    pub async fn record_error(&self, name: &str, error: impl Into<String>, now: DateTime<Utc>) -> StoreResult<()> {
        let mut exchanges = self.exchanges.write().await;
        let exchange = exchanges.get_mut(name).ok_or_else(|| StoreError::NotFound {
            collection: COLLECTION,
            id: name.to_string(),
        })?;
        exchange.record_error(error, now);
        if exchange.consecutive_errors == UNHEALTHY_CONSECUTIVE_ERRORS {
            warn!(
                exchange = %name,
                consecutive_errors = exchange.consecutive_errors,
                last_error = ?exchange.last_error,
                "Exchange is now unhealthy"
            );
        }
        Ok(())
    }

    pub async fn set_active(&self, name: &str, is_active: bool, now: DateTime<Utc>) -> StoreResult<Exchange> {
        let mut exchanges = self.exchanges.write().await;
        let exchange = exchanges.get_mut(name).ok_or_else(|| StoreError::NotFound {
            collection: COLLECTION,
            id: name.to_string(),
        })?;
        exchange.is_active = is_active;
        exchange.updated_at = now;
        info!(exchange = %name, is_active, "Updated exchange status");
        Ok(exchange.clone())
    }

    pub async fn health_summary(&self) -> ExchangeHealthSummary {
        let exchanges = self.exchanges.read().await;

        let total_requests = exchanges
            .values()
            .fold(0u64, |total, exchange| total.saturating_add(exchange.total_requests));
        let total_errors = exchanges
            .values()
            .fold(0u64, |total, exchange| total.saturating_add(exchange.total_errors));

        let mut unhealthy_exchanges: Vec<UnhealthyExchange> = exchanges
            .values()
            .filter(|exchange| !exchange.is_healthy())
            .map(|exchange| UnhealthyExchange {
                name: exchange.name.clone(),
                consecutive_errors: exchange.consecutive_errors,
                last_error: exchange.last_error.clone(),
                is_active: exchange.is_active,
            })
            .collect();
        unhealthy_exchanges.sort_by(|a, b| a.name.cmp(&b.name));

        ExchangeHealthSummary {
            total_exchanges: exchanges.len(),
            active_exchanges: exchanges.values().filter(|exchange| exchange.is_active).count(),
            healthy_exchanges: exchanges.values().filter(|exchange| exchange.is_healthy()).count(),
            total_requests,
            total_errors,
            error_rate_percent: error_rate_percent(total_errors, total_requests),
            unhealthy_exchanges,
        }
    }

    pub async fn len(&self) -> usize {
        self.exchanges.read().await.len()
    }
}

fn error_rate_percent(errors: u64, requests: u64) -> Decimal {
    if requests == 0 {
        return Decimal::ZERO;
    }
    // u64 counts always fit a Decimal and errors never exceed requests
    (Decimal::from(errors) * Decimal::ONE_HUNDRED / Decimal::from(requests)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    async fn store_with(names: &[(&str, ExchangeType)]) -> ExchangeStore {
        let store = ExchangeStore::new();
        for (name, kind) in names {
            store.register(ExchangeDraft::new(*name, *kind), now()).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn name_is_unique() {
        let store = store_with(&[("binance", ExchangeType::Cex)]).await;
        let err = store
            .register(ExchangeDraft::new("binance", ExchangeType::Dex), now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { collection: "exchange", .. }));

        let mut throttled = ExchangeDraft::new("kraken", ExchangeType::Cex);
        throttled.rate_limit_per_minute = 0;
        assert!(matches!(
            store.register(throttled, now()).await,
            Err(StoreError::InvalidDocument { .. })
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn list_filters_by_type_and_sorts_by_name() {
        let store = store_with(&[
            ("uniswap", ExchangeType::Dex),
            ("kraken", ExchangeType::Cex),
            ("binance", ExchangeType::Cex),
        ])
        .await;

        let cex = ExchangeFilter {
            exchange_type: Some(ExchangeType::Cex),
            ..ExchangeFilter::default()
        };
        let page = store.list(&cex, PageRequest::default()).await.unwrap();
        let names: Vec<_> = page.items.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["binance", "kraken"]);
    }

    #[tokio::test]
    async fn health_summary_aggregates_counters() {
        let store = store_with(&[
            ("binance", ExchangeType::Cex),
            ("kraken", ExchangeType::Cex),
            ("uniswap", ExchangeType::Dex),
        ])
        .await;

        for _ in 0..5 {
            store.record_success("binance", Some(120), now()).await.unwrap();
        }
        for _ in 0..3 {
            store.record_error("kraken", "timeout", now()).await.unwrap();
        }
        store.set_active("uniswap", false, now()).await.unwrap();
        assert!(store.record_error("missing", "timeout", now()).await.is_err());

        let summary = store.health_summary().await;
        assert_eq!(summary.total_exchanges, 3);
        assert_eq!(summary.active_exchanges, 2);
        assert_eq!(summary.healthy_exchanges, 1);
        assert_eq!(summary.total_requests, 8);
        assert_eq!(summary.total_errors, 3);
        assert_eq!(summary.error_rate_percent, dec!(37.5));

        let unhealthy: Vec<_> = summary.unhealthy_exchanges.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(unhealthy, vec!["kraken", "uniswap"]);
        assert_eq!(summary.unhealthy_exchanges[0].last_error.as_deref(), Some("timeout"));
        assert!(!summary.unhealthy_exchanges[1].is_active);
    }

    #[tokio::test]
    async fn error_rate_is_zero_before_any_request() {
        let store = store_with(&[("binance", ExchangeType::Cex)]).await;
        let summary = store.health_summary().await;
        assert_eq!(summary.error_rate_percent, Decimal::ZERO);
        assert!(summary.unhealthy_exchanges.is_empty());
    }
}
