//! In-memory multi-exchange document store, one document per symbol

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use super::{Page, PageRequest};
use crate::{
    errors::{StoreError, StoreResult},
    types::{MultiExchangeOpportunity, Priority},
};

const COLLECTION: &str = "multi_exchange_opportunity";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiExchangeFilter {
    pub symbol: Option<String>,
    pub priority: Option<Priority>,
    pub min_best_return_percent: Option<Decimal>,
}

impl MultiExchangeFilter {
    pub fn matches(&self, document: &MultiExchangeOpportunity) -> bool {
        if let Some(symbol) = &self.symbol {
            if !document.symbol().eq_ignore_ascii_case(symbol.trim()) {
                return false;
            }
        }
        if self.priority.is_some_and(|priority| priority != document.priority()) {
            return false;
        }
        if let Some(min) = self.min_best_return_percent {
            if document.best_overall_return().is_none_or(|best| best < min) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct MultiExchangeStore {
    documents: Arc<RwLock<BTreeMap<String, MultiExchangeOpportunity>>>,
}

impl MultiExchangeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the latest scan for its symbol. A scan replacing an earlier
    /// document keeps that document's id and creation time.
    pub async fn upsert(&self, document: MultiExchangeOpportunity) -> StoreResult<MultiExchangeOpportunity> {
        document.verify()?;
        let key = document.symbol().to_uppercase();

        let mut documents = self.documents.write().await;
        let document = match documents.get(&key) {
            Some(previous) => {
                debug!(symbol = %key, id = %previous.id(), "Superseding multi-exchange document");
                document.supersede(previous)
            }
            None => document,
        };

        info!(
            symbol = %key,
            opportunities = document.total_opportunities(),
            best_return = ?document.best_overall_return(),
            priority = %document.priority(),
            next_scan_at = %document.next_scan_at(),
            "Stored multi-exchange document"
        );
        documents.insert(key, document.clone());
        Ok(document)
    }

    pub async fn get(&self, symbol: &str) -> StoreResult<MultiExchangeOpportunity> {
        let key = symbol.trim().to_uppercase();
        self.documents
            .read()
            .await
            .get(&key)
            .cloned()
            .ok_or(StoreError::NotFound {
                collection: COLLECTION,
                id: key,
            })
    }

    /// Highest best-overall return first; documents without opportunities last.
    pub async fn list(&self, filter: &MultiExchangeFilter) -> Vec<MultiExchangeOpportunity> {
        let mut matching: Vec<MultiExchangeOpportunity> = self
            .documents
            .read()
            .await
            .values()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            b.best_overall_return()
                .cmp(&a.best_overall_return())
                .then_with(|| a.symbol().cmp(b.symbol()))
        });
        matching
    }

    pub async fn page(
        &self,
        filter: &MultiExchangeFilter,
        request: PageRequest,
    ) -> StoreResult<Page<MultiExchangeOpportunity>> {
        request.validate()?;
        Page::from_sorted(self.list(filter).await, request)
    }

    /// Documents whose next scan time has passed, high priority first and
    /// then the longest overdue.
    pub async fn due_for_scan(&self, now: DateTime<Utc>) -> Vec<MultiExchangeOpportunity> {
        let mut due: Vec<MultiExchangeOpportunity> = self
            .documents
            .read()
            .await
            .values()
            .filter(|doc| doc.is_due(now))
            .cloned()
            .collect();

        due.sort_by(|a, b| {
            a.priority()
                .rank()
                .cmp(&b.priority().rank())
                .then_with(|| a.next_scan_at().cmp(&b.next_scan_at()))
                .then_with(|| a.symbol().cmp(b.symbol()))
        });
        due
    }

    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    pub async fn snapshot(&self) -> Vec<MultiExchangeOpportunity> {
        self.documents.read().await.values().cloned().collect()
    }
}
