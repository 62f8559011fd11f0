//! Aggregate reports over stored opportunities and scan documents
//!
//! Values are rounded to two decimal places here and nowhere else.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use crate::types::{ExchangePairKey, MultiExchangeOpportunity, Opportunity};

pub const MIN_OVERVIEW_DAYS: i64 = 1;
pub const MAX_OVERVIEW_DAYS: i64 = 365;
const RECENT_WINDOW_HOURS: i64 = 24;
const REPORT_DP: u32 = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnStatistics {
    pub average_return_percent: Decimal,
    pub max_return_percent: Decimal,
    pub min_return_percent: Decimal,
}

impl ReturnStatistics {
    fn from_returns(returns: &[Decimal]) -> Self {
        Self {
            average_return_percent: round(average(returns)),
            max_return_percent: round(returns.iter().copied().max().unwrap_or_default()),
            min_return_percent: round(returns.iter().copied().min().unwrap_or_default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpportunitySummary {
    pub total_opportunities: usize,
    pub executed_opportunities: usize,
    pub pending_opportunities: usize,
    pub recent_opportunities_24h: usize,
    pub return_statistics: ReturnStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsOverview {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub days: i64,
    pub total_opportunities: usize,
    pub executed_opportunities: usize,
    pub pending_opportunities: usize,
    pub average_return_percent: Decimal,
    pub max_return_percent: Decimal,
    pub unique_tokens: usize,
    pub unique_exchanges: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenPerformance {
    pub symbol: String,
    pub total_opportunities: usize,
    pub average_return_percent: Decimal,
    pub max_return_percent: Decimal,
    pub total_capital_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangePairPerformance {
    pub pair: ExchangePairKey,
    pub total_opportunities: usize,
    pub average_return_percent: Decimal,
    pub max_return_percent: Decimal,
    pub success_rate_percent: Decimal,
}

pub fn summarize(opportunities: &[Opportunity], now: DateTime<Utc>) -> OpportunitySummary {
    let recent_cutoff = now - Duration::hours(RECENT_WINDOW_HOURS);
    let executed = opportunities.iter().filter(|opp| opp.is_executed()).count();
    let returns: Vec<Decimal> = opportunities.iter().map(Opportunity::estimated_return_percent).collect();

    OpportunitySummary {
        total_opportunities: opportunities.len(),
        executed_opportunities: executed,
        pending_opportunities: opportunities.len() - executed,
        recent_opportunities_24h: opportunities
            .iter()
            .filter(|opp| opp.created_at() >= recent_cutoff)
            .count(),
        return_statistics: ReturnStatistics::from_returns(&returns),
    }
}

/// Window report over opportunities created in the last `days` days.
/// `days` is clamped to 1..=365.
pub fn overview(opportunities: &[Opportunity], now: DateTime<Utc>, days: i64) -> AnalyticsOverview {
    let days = days.clamp(MIN_OVERVIEW_DAYS, MAX_OVERVIEW_DAYS);
    let start_date = now - Duration::days(days);
    let in_window: Vec<&Opportunity> = opportunities
        .iter()
        .filter(|opp| opp.created_at() >= start_date && opp.created_at() <= now)
        .collect();

    let executed = in_window.iter().filter(|opp| opp.is_executed()).count();
    let returns: Vec<Decimal> = in_window.iter().map(|opp| opp.estimated_return_percent()).collect();
    let unique_tokens: BTreeSet<&str> = in_window.iter().map(|opp| opp.token_symbol()).collect();
    let unique_exchanges: BTreeSet<&str> = in_window
        .iter()
        .flat_map(|opp| opp.source_exchanges().iter().map(String::as_str))
        .collect();

    AnalyticsOverview {
        start_date,
        end_date: now,
        days,
        total_opportunities: in_window.len(),
        executed_opportunities: executed,
        pending_opportunities: in_window.len() - executed,
        average_return_percent: round(average(&returns)),
        max_return_percent: round(returns.iter().copied().max().unwrap_or_default()),
        unique_tokens: unique_tokens.len(),
        unique_exchanges: unique_exchanges.len(),
    }
}

pub fn token_performance(opportunities: &[Opportunity], limit: usize) -> Vec<TokenPerformance> {
    let mut by_symbol: BTreeMap<&str, Vec<&Opportunity>> = BTreeMap::new();
    for opp in opportunities {
        by_symbol.entry(opp.token_symbol()).or_default().push(opp);
    }

    let mut report: Vec<(Decimal, TokenPerformance)> = by_symbol
        .into_iter()
        .map(|(symbol, group)| {
            let returns: Vec<Decimal> = group.iter().map(|opp| opp.estimated_return_percent()).collect();
            let avg = average(&returns);
            let performance = TokenPerformance {
                symbol: symbol.to_string(),
                total_opportunities: group.len(),
                average_return_percent: round(avg),
                max_return_percent: round(returns.iter().copied().max().unwrap_or_default()),
                total_capital_usd: round(
                    group
                        .iter()
                        .fold(Decimal::ZERO, |total, opp| total.saturating_add(opp.capital_required_usd())),
                ),
            };
            (avg, performance)
        })
        .collect();

    // sort on the unrounded average; BTreeMap order breaks ties by symbol
    report.sort_by(|a, b| b.0.cmp(&a.0));
    report.into_iter().take(limit).map(|(_, p)| p).collect()
}

/// Per exchange pair across all documents. A pair opportunity counts as a
/// success when its gross return is strictly above `success_threshold`.
pub fn exchange_pair_analytics(
    documents: &[MultiExchangeOpportunity],
    success_threshold: Decimal,
    limit: usize,
) -> Vec<ExchangePairPerformance> {
    let mut by_pair: BTreeMap<&ExchangePairKey, Vec<Decimal>> = BTreeMap::new();
    for document in documents {
        for (key, list) in document.exchange_pair_opportunities() {
            by_pair
                .entry(key)
                .or_default()
                .extend(list.iter().map(|opp| opp.gross_return_percent()));
        }
    }

    let mut report: Vec<(Decimal, ExchangePairPerformance)> = by_pair
        .into_iter()
        .filter(|(_, returns)| !returns.is_empty())
        .map(|(key, returns)| {
            let avg = average(&returns);
            let successes = returns.iter().filter(|r| **r > success_threshold).count();
            let success_rate = Decimal::from(successes) / Decimal::from(returns.len()) * Decimal::ONE_HUNDRED;
            let performance = ExchangePairPerformance {
                pair: key.clone(),
                total_opportunities: returns.len(),
                average_return_percent: round(avg),
                max_return_percent: round(returns.iter().copied().max().unwrap_or_default()),
                success_rate_percent: round(success_rate),
            };
            (avg, performance)
        })
        .collect();

    report.sort_by(|a, b| b.0.cmp(&a.0));
    report.into_iter().take(limit).map(|(_, p)| p).collect()
}

/// Divides before summing when the plain sum would overflow.
fn average(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    let count = Decimal::from(values.len());
    values
        .iter()
        .try_fold(Decimal::ZERO, |total, value| total.checked_add(*value))
        .and_then(|sum| sum.checked_div(count))
        .unwrap_or_else(|| {
            values
                .iter()
                .fold(Decimal::ZERO, |total, value| total.saturating_add(*value / count))
        })
}

fn round(value: Decimal) -> Decimal {
    value.round_dp(REPORT_DP)
}
