//! In-memory opportunity store

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use super::{Page, PageRequest, SortDirection};
use crate::{
    errors::{StoreError, StoreResult},
    types::{ExecutionResult, Opportunity, OpportunityClass, RiskLevel},
    valuation::select_best,
};

const COLLECTION: &str = "opportunity";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpportunityFilter {
    pub token_symbol: Option<String>,
    pub opportunity_class: Option<OpportunityClass>,
    pub risk_level: Option<RiskLevel>,
    pub min_return_percent: Option<Decimal>,
    pub min_net_return_percent: Option<Decimal>,
    pub is_executed: Option<bool>,
}

impl OpportunityFilter {
    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            token_symbol: Some(symbol.to_string()),
            ..Self::default()
        }
    }

    pub fn matches(&self, opportunity: &Opportunity) -> bool {
        if let Some(symbol) = &self.token_symbol {
            if !opportunity.token_symbol().eq_ignore_ascii_case(symbol.trim()) {
                return false;
            }
        }
        if self.opportunity_class.is_some_and(|class| class != opportunity.opportunity_class()) {
            return false;
        }
        if self.risk_level.is_some_and(|risk| risk != opportunity.risk_level()) {
            return false;
        }
        if self.min_return_percent.is_some_and(|min| opportunity.estimated_return_percent() < min) {
            return false;
        }
        if self.min_net_return_percent.is_some_and(|min| opportunity.net_return_percent() < min) {
            return false;
        }
        if self.is_executed.is_some_and(|executed| executed != opportunity.is_executed()) {
            return false;
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunitySortField {
    #[default]
    CreatedAt,
    EstimatedReturn,
    NetReturn,
    Confidence,
    CapitalRequired,
}

impl OpportunitySortField {
    fn compare(self, a: &Opportunity, b: &Opportunity) -> Ordering {
        match self {
            Self::CreatedAt => a.created_at().cmp(&b.created_at()),
            Self::EstimatedReturn => a.estimated_return_percent().cmp(&b.estimated_return_percent()),
            Self::NetReturn => a.net_return_percent().cmp(&b.net_return_percent()),
            Self::Confidence => a.confidence_score().cmp(&b.confidence_score()),
            Self::CapitalRequired => a.capital_required_usd().cmp(&b.capital_required_usd()),
        }
    }
}

/// Opportunity documents keyed by id. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct OpportunityStore {
    documents: Arc<RwLock<HashMap<String, Opportunity>>>,
}

impl OpportunityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces by id.
    pub async fn insert(&self, opportunity: Opportunity) -> String {
        let id = opportunity.id().to_string();
        debug!(
            opportunity_id = %id,
            symbol = %opportunity.token_symbol(),
            net_return = %opportunity.net_return_percent(),
            "Stored opportunity"
        );
        self.documents.write().await.insert(id.clone(), opportunity);
        id
    }

    /// Inserts unless a stored opportunity already describes the same market
    /// data. Returns the id of the new record, or `None` for a repeat.
    pub async fn insert_new(&self, opportunity: Opportunity) -> Option<String> {
        let mut documents = self.documents.write().await;
        if let Some(existing) = documents.values().find(|stored| stored.same_market_as(&opportunity)) {
            debug!(
                opportunity_id = %existing.id(),
                symbol = %opportunity.token_symbol(),
                "Opportunity already recorded for this market data"
            );
            return None;
        }

        let id = opportunity.id().to_string();
        debug!(
            opportunity_id = %id,
            symbol = %opportunity.token_symbol(),
            net_return = %opportunity.net_return_percent(),
            "Stored opportunity"
        );
        documents.insert(id.clone(), opportunity);
        Some(id)
    }

    pub async fn get(&self, id: &str) -> StoreResult<Opportunity> {
        self.documents
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                collection: COLLECTION,
                id: id.to_string(),
            })
    }

    pub async fn list(
        &self,
        filter: &OpportunityFilter,
        sort_by: OpportunitySortField,
        direction: SortDirection,
        request: PageRequest,
    ) -> StoreResult<Page<Opportunity>> {
        request.validate()?;

        let mut matching: Vec<Opportunity> = self
            .documents
            .read()
            .await
            .values()
            .filter(|opp| filter.matches(opp))
            .cloned()
            .collect();

        matching.sort_by(|a, b| {
            let ordering = sort_by.compare(a, b).then_with(|| a.id().cmp(b.id()));
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        Page::from_sorted(matching, request)
    }

    pub async fn count(&self, filter: &OpportunityFilter) -> usize {
        self.documents
            .read()
            .await
            .values()
            .filter(|opp| filter.matches(opp))
            .count()
    }

    /// Best-ranked opportunity for `symbol` whose market data is not older
    /// than `since`.
    pub async fn best_since(&self, symbol: &str, since: DateTime<Utc>) -> Option<Opportunity> {
        let filter = OpportunityFilter::for_symbol(symbol);
        let documents = self.documents.read().await;
        select_best(
            documents
                .values()
                .filter(|opp| filter.matches(opp) && opp.data_timestamp() >= since),
        )
        .cloned()
    }

    pub async fn mark_executed(
        &self,
        id: &str,
        result: Option<ExecutionResult>,
        now: DateTime<Utc>,
    ) -> StoreResult<Opportunity> {
        let mut documents = self.documents.write().await;
        let opportunity = documents.get_mut(id).ok_or_else(|| StoreError::NotFound {
            collection: COLLECTION,
            id: id.to_string(),
        })?;

        opportunity.mark_executed(result, now);
        info!(
            opportunity_id = %id,
            symbol = %opportunity.token_symbol(),
            success = opportunity.execution_result().map(|r| r.success),
            "Marked opportunity executed"
        );
        Ok(opportunity.clone())
    }

    pub async fn snapshot(&self) -> Vec<Opportunity> {
        self.documents.read().await.values().cloned().collect()
    }
}
