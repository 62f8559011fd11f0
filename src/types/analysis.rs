//! Record of one scan cycle across all tokens

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use super::MultiExchangeOpportunity;

pub const MULTI_EXCHANGE_SCAN: &str = "multi_exchange_scan";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub analysis_id: String,
    pub analysis_type: String,
    pub tokens_analyzed: Vec<String>,
    pub exchanges_used: Vec<String>,
    pub total_opportunities_found: usize,
    pub total_tokens_with_opportunities: usize,
    /// Best and average net return over the per-token best pairs.
    pub best_opportunity_return: Option<Decimal>,
    pub average_opportunity_return: Option<Decimal>,
    pub errors_encountered: usize,
    pub opportunities_by_token: BTreeMap<String, usize>,
    pub opportunities_by_exchange_pair: BTreeMap<String, usize>,
    pub error_details: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl AnalysisRun {
    pub fn duration_ms(&self) -> i64 {
        (self.completed_at - self.started_at).num_milliseconds()
    }
}

/// Collects scan results while a cycle runs.
#[derive(Debug, Clone)]
pub struct AnalysisRunBuilder {
    analysis_type: String,
    started_at: DateTime<Utc>,
    tokens: BTreeSet<String>,
    exchanges: BTreeSet<String>,
    by_token: BTreeMap<String, usize>,
    by_pair: BTreeMap<String, usize>,
    best_returns: Vec<Decimal>,
    errors: Vec<String>,
}

impl AnalysisRunBuilder {
    pub fn new(analysis_type: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            analysis_type: analysis_type.into(),
            started_at,
            tokens: BTreeSet::new(),
            exchanges: BTreeSet::new(),
            by_token: BTreeMap::new(),
            by_pair: BTreeMap::new(),
            best_returns: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn record_scan(&mut self, scan: &MultiExchangeOpportunity) {
        self.tokens.insert(scan.symbol().to_string());
        self.exchanges.extend(scan.supported_exchanges().iter().cloned());

        let found = scan.total_opportunities();
        if found > 0 {
            *self.by_token.entry(scan.symbol().to_string()).or_insert(0) += found;
        }
        for (key, list) in scan.exchange_pair_opportunities() {
            if !list.is_empty() {
                *self.by_pair.entry(key.to_string()).or_insert(0) += list.len();
            }
        }
        if let Some(best) = scan.best_overall_return() {
            self.best_returns.push(best);
        }
    }

    pub fn record_error(&mut self, symbol: &str, error: impl std::fmt::Display) {
        self.tokens.insert(symbol.to_string());
        self.errors.push(format!("{}: {}", symbol, error));
    }

    pub fn finish(self, completed_at: DateTime<Utc>) -> AnalysisRun {
        let average = checked_average(&self.best_returns);

        AnalysisRun {
            analysis_id: uuid::Uuid::new_v4().to_string(),
            analysis_type: self.analysis_type,
            total_opportunities_found: self.by_token.values().sum(),
            total_tokens_with_opportunities: self.by_token.len(),
            best_opportunity_return: self.best_returns.iter().copied().max(),
            average_opportunity_return: average,
            errors_encountered: self.errors.len(),
            tokens_analyzed: self.tokens.into_iter().collect(),
            exchanges_used: self.exchanges.into_iter().collect(),
            opportunities_by_token: self.by_token,
            opportunities_by_exchange_pair: self.by_pair,
            error_details: self.errors,
            started_at: self.started_at,
            completed_at,
        }
    }
}

/// None for no values or a sum a `Decimal` cannot hold.
fn checked_average(values: &[Decimal]) -> Option<Decimal> {
    let sum = values
        .iter()
        .try_fold(Decimal::ZERO, |total, value| total.checked_add(*value))?;
    sum.checked_div(Decimal::from(values.len()))
}
